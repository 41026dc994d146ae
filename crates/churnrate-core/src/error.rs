use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while measuring churn.
///
/// Library crates return this type directly; the binary converts it to a
/// `miette::Report` at the boundary so the `help` text reaches the user.
///
/// # Examples
///
/// ```
/// use churnrate_core::ChurnError;
///
/// let err = ChurnError::NoHistoryInWindow { window_days: 28 };
/// assert!(err.to_string().contains("28 days"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ChurnError {
    /// Remote clone or local path resolution failed.
    #[error("failed to acquire repository {location}: {cause}")]
    #[diagnostic(
        code(churnrate::acquisition_failed),
        help("check that the URL is reachable and `git` is installed and on PATH")
    )]
    AcquisitionFailed {
        /// The path or URL that was requested.
        location: String,
        /// Underlying failure, verbatim.
        cause: String,
    },

    /// The local path has no git metadata or no working tree.
    #[error("not a git repository: {}", .0.display())]
    #[diagnostic(
        code(churnrate::not_a_repository),
        help("point at the root of a git working tree, or pass a clone URL")
    )]
    NotARepository(PathBuf),

    /// Every tracked file is empty, binary, or unreadable.
    #[error("repository has no tracked lines: {0}")]
    #[diagnostic(code(churnrate::empty_codebase))]
    EmptyCodebase(String),

    /// Nothing left to report after bootstrap-week exclusion.
    #[error("no commit history found in the last {window_days} days")]
    #[diagnostic(
        code(churnrate::no_history),
        help("try a larger --days window, or a larger --depth-per-day for remote repositories")
    )]
    NoHistoryInWindow {
        /// Size of the requested window.
        window_days: u32,
    },

    /// Git process or library failure while reading history.
    #[error("git error: {0}")]
    #[diagnostic(code(churnrate::git))]
    Git(String),

    /// The caller aborted the analysis.
    #[error("analysis cancelled")]
    Cancelled,

    /// The analysis exceeded its configured time budget.
    #[error("analysis timed out after {}s", .0.as_secs())]
    #[diagnostic(help("raise --timeout or analysis.timeout_secs in .churnrate.toml"))]
    TimedOut(Duration),

    /// GitHub API failure.
    #[error("GitHub error: {0}")]
    #[diagnostic(code(churnrate::github))]
    GitHub(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
