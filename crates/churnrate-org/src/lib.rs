//! GitHub organization listing for multi-repository churn runs.
//!
//! Lists an organization's repositories through the GitHub REST API and picks
//! the most recently pushed ones as analysis targets.

pub mod github;

pub use github::{resolve_token, select_targets, GitHubClient, OrgRepo, DEFAULT_REPO_LIMIT};
