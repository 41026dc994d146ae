//! Shared error type, configuration, and output types for git-churnrate.
//!
//! - [`ChurnError`]: unified error type using `thiserror` and `miette`
//! - [`ChurnConfig`]: configuration loaded from `.churnrate.toml`
//! - [`OutputFormat`]: report format selected on the command line

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, ChurnConfig, OrgConfig};
pub use error::ChurnError;
pub use types::OutputFormat;

/// A convenience `Result` type for churn analysis operations.
pub type Result<T> = std::result::Result<T, ChurnError>;
