//! Repository acquisition: open a local working tree or shallow-clone a
//! remote one into a scoped temporary directory.

use std::fmt;
use std::path::{Path, PathBuf};

use churnrate_core::ChurnError;
use git2::Repository;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::process::GitCommand;

const REMOTE_PREFIXES: &[&str] = &[
    "http://", "https://", "git@", "git://", "ssh://", "file://",
];

/// Where the repository to analyze lives.
///
/// # Examples
///
/// ```
/// use churnrate_engine::acquire::RepoLocator;
///
/// assert!(RepoLocator::parse("https://github.com/rust-lang/rust.git").is_remote());
/// assert!(RepoLocator::parse("git@github.com:rust-lang/rust.git").is_remote());
/// assert!(!RepoLocator::parse("../checkout").is_remote());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocator {
    /// A path to an existing working tree.
    Local(PathBuf),
    /// A clone URL.
    Remote(String),
}

impl RepoLocator {
    /// Classify a user-supplied location by its URL prefix.
    pub fn parse(location: &str) -> Self {
        if REMOTE_PREFIXES.iter().any(|p| location.starts_with(p)) {
            RepoLocator::Remote(location.to_string())
        } else {
            RepoLocator::Local(PathBuf::from(location))
        }
    }

    /// Returns `true` for clone URLs.
    pub fn is_remote(&self) -> bool {
        matches!(self, RepoLocator::Remote(_))
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoLocator::Local(path) => write!(f, "{}", path.display()),
            RepoLocator::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// A readable working tree owned by one analysis run.
///
/// Cloned snapshots own their temporary directory; dropping the snapshot
/// removes it, whichever way the run ends.
#[derive(Debug)]
pub struct Snapshot {
    root: PathBuf,
    scratch: Option<TempDir>,
}

impl Snapshot {
    /// Root of the working tree.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns `true` if the snapshot lives in a temporary clone.
    pub fn is_transient(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Produce a snapshot for `locator`.
///
/// Remote locators are cloned with `--depth=<depth>`; local locators must be
/// non-bare git working trees. Nothing is retried.
///
/// # Errors
///
/// - [`ChurnError::AcquisitionFailed`] if the path cannot be resolved or the clone fails.
/// - [`ChurnError::NotARepository`] if a local path is not a git working tree.
/// - [`ChurnError::Cancelled`] if `cancel` fires during the clone.
pub async fn acquire(
    locator: &RepoLocator,
    depth: u64,
    cancel: &CancellationToken,
) -> Result<Snapshot, ChurnError> {
    match locator {
        RepoLocator::Local(path) => open_local(path),
        RepoLocator::Remote(url) => clone_shallow(url, depth, cancel).await,
    }
}

fn open_local(path: &Path) -> Result<Snapshot, ChurnError> {
    let abs = path
        .canonicalize()
        .map_err(|e| ChurnError::AcquisitionFailed {
            location: path.display().to_string(),
            cause: e.to_string(),
        })?;

    let repo = Repository::open(&abs).map_err(|_| ChurnError::NotARepository(abs.clone()))?;
    let root = repo
        .workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| ChurnError::NotARepository(abs.clone()))?;

    debug!(root = %root.display(), "using local working tree");
    Ok(Snapshot {
        root,
        scratch: None,
    })
}

async fn clone_shallow(
    url: &str,
    depth: u64,
    cancel: &CancellationToken,
) -> Result<Snapshot, ChurnError> {
    let acquisition_failed = |cause: String| ChurnError::AcquisitionFailed {
        location: url.to_string(),
        cause,
    };

    let scratch = tempfile::Builder::new()
        .prefix("churnrate-")
        .tempdir()
        .map_err(|e| acquisition_failed(format!("failed to create temp dir: {e}")))?;
    let root = scratch.path().to_path_buf();

    debug!(url, depth, dest = %root.display(), "shallow cloning");
    let clone = GitCommand::new([
        "clone".into(),
        format!("--depth={depth}"),
        "--quiet".into(),
        url.to_string(),
        root.to_string_lossy().into_owned(),
    ]);

    match clone.output(cancel).await {
        Ok(_) => Ok(Snapshot {
            root,
            scratch: Some(scratch),
        }),
        Err(ChurnError::Git(cause)) => Err(acquisition_failed(cause)),
        Err(other) => Err(other),
    }
}
