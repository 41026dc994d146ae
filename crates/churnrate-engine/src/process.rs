//! Async wrapper around the `git` executable.
//!
//! Every invocation is tied to a [`CancellationToken`]: when the token fires,
//! the pending future resolves to [`ChurnError::Cancelled`] and the child
//! process is killed when its handle drops.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use churnrate_core::ChurnError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A single `git` invocation.
///
/// # Examples
///
/// ```
/// use churnrate_engine::process::GitCommand;
///
/// let cmd = GitCommand::new(["log", "--pretty=format:%ct"]);
/// assert_eq!(cmd.to_string(), "git log --pretty=format:%ct");
/// ```
#[derive(Debug, Clone)]
pub struct GitCommand {
    args: Vec<OsString>,
    dir: Option<PathBuf>,
}

impl GitCommand {
    /// Build a command from its arguments (without the leading `git`).
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            dir: None,
        }
    }

    /// Run inside `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Run to completion and return stdout.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnError::Git`] if `git` cannot be spawned or exits
    /// non-zero (stderr is included), or [`ChurnError::Cancelled`] if `cancel`
    /// fires first.
    pub async fn output(&self, cancel: &CancellationToken) -> Result<String, ChurnError> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(&self.args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }

        debug!(command = %self, "spawning git");
        let child = cmd
            .spawn()
            .map_err(|e| ChurnError::Git(format!("failed to run `{self}`: {e}")))?;

        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ChurnError::Cancelled),
            out = child.wait_with_output() => {
                out.map_err(|e| ChurnError::Git(format!("failed to wait for `{self}`: {e}")))?
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChurnError::Git(format!(
                "`{self}` exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl std::fmt::Display for GitCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "git")?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
