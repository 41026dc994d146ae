use chrono::{DateTime, Utc};
use churnrate_core::ChurnError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Repositories analyzed per organization when no limit is configured.
pub const DEFAULT_REPO_LIMIT: usize = 10;

/// Environment variables checked for a GitHub token, in order.
const TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// One repository of an organization, as far as churn analysis cares.
///
/// Field names follow the GitHub REST payload so the struct also
/// deserializes straight from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRepo {
    /// Repository name without the owner.
    pub name: String,
    /// HTTPS clone URL.
    pub clone_url: String,
    /// Whether the repository is a fork.
    #[serde(default)]
    pub fork: bool,
    /// Last push; `None` for repositories that were never pushed to.
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

impl OrgRepo {
    fn from_model(repo: octocrab::models::Repository) -> Option<Self> {
        let clone_url = repo.clone_url?.to_string();
        Some(Self {
            name: repo.name,
            clone_url,
            fork: repo.fork.unwrap_or(false),
            pushed_at: repo.pushed_at,
        })
    }
}

/// Pick the token to authenticate with.
///
/// `GITHUB_TOKEN` and then `GH_TOKEN` take precedence over `configured`
/// (the `[org] token` config value). Empty values are ignored. `None` means
/// anonymous access, which works for public organizations under a lower
/// rate limit.
pub fn resolve_token(configured: Option<&str>) -> Option<String> {
    resolve_token_with(configured, |var| std::env::var(var).ok())
}

fn resolve_token_with(
    configured: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    TOKEN_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .chain(configured.map(str::to_string))
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}

/// GitHub REST client for listing organization repositories.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
}

impl GitHubClient {
    /// Create a client, authenticated when `token` is given.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnError::GitHub`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use churnrate_org::{resolve_token, GitHubClient};
    ///
    /// let client = GitHubClient::new(resolve_token(None)).unwrap();
    /// ```
    pub fn new(token: Option<String>) -> Result<Self, ChurnError> {
        let builder = octocrab::Octocrab::builder();
        let builder = match token {
            Some(token) => builder.personal_token(token),
            None => builder,
        };
        let octocrab = builder
            .build()
            .map_err(|e| ChurnError::GitHub(format!("failed to create GitHub client: {e}")))?;
        Ok(Self { octocrab })
    }

    /// List every repository of `org`, following pagination.
    ///
    /// Repositories without a clone URL are left out.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnError::GitHub`] on network or API errors, including an
    /// unknown organization.
    pub async fn list_org_repos(&self, org: &str) -> Result<Vec<OrgRepo>, ChurnError> {
        let first = self
            .octocrab
            .orgs(org)
            .list_repos()
            .per_page(100)
            .send()
            .await
            .map_err(|e| ChurnError::GitHub(format!("failed to list repositories of {org}: {e}")))?;
        let repos = self
            .octocrab
            .all_pages(first)
            .await
            .map_err(|e| ChurnError::GitHub(format!("failed to page repositories of {org}: {e}")))?;

        debug!(org, count = repos.len(), "listed organization repositories");
        Ok(repos.into_iter().filter_map(OrgRepo::from_model).collect())
    }
}

/// Choose up to `limit` analysis targets, most recently pushed first.
///
/// Forks are dropped unless `include_forks` is set. Repositories never pushed
/// to sort last; ties keep name order.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use churnrate_org::{select_targets, OrgRepo};
///
/// let repo = |name: &str, day: u32, fork: bool| OrgRepo {
///     name: name.into(),
///     clone_url: format!("https://github.com/acme/{name}.git"),
///     fork,
///     pushed_at: Some(Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()),
/// };
/// let picked = select_targets(
///     vec![repo("old", 1, false), repo("new", 20, false), repo("copy", 25, true)],
///     10,
///     false,
/// );
/// let names: Vec<_> = picked.iter().map(|r| r.name.as_str()).collect();
/// assert_eq!(names, ["new", "old"]);
/// ```
pub fn select_targets(repos: Vec<OrgRepo>, limit: usize, include_forks: bool) -> Vec<OrgRepo> {
    let mut targets: Vec<OrgRepo> = repos
        .into_iter()
        .filter(|r| include_forks || !r.fork)
        .collect();
    targets.sort_by(|a, b| {
        b.pushed_at
            .cmp(&a.pushed_at)
            .then_with(|| a.name.cmp(&b.name))
    });
    targets.truncate(limit);
    targets
}
