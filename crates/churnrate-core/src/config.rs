use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChurnError;

/// Top-level configuration loaded from `.churnrate.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use churnrate_core::ChurnConfig;
///
/// let config = ChurnConfig::default();
/// assert_eq!(config.analysis.days, 28);
/// assert_eq!(config.org.limit, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChurnConfig {
    /// Window and acquisition settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Organization mode settings.
    #[serde(default)]
    pub org: OrgConfig,
}

impl ChurnConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnError::Io`] if the file cannot be read,
    /// [`ChurnError::Toml`] if the content is not valid TOML, or
    /// [`ChurnError::Config`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ChurnError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnError::Toml`] if parsing fails, or
    /// [`ChurnError::Config`] if `days` or `depth_per_day` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use churnrate_core::ChurnConfig;
    ///
    /// let toml = r#"
    /// [analysis]
    /// days = 90
    /// "#;
    /// let config = ChurnConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.analysis.days, 90);
    /// assert_eq!(config.analysis.depth_per_day, 35);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ChurnError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ChurnError> {
        if self.analysis.days == 0 {
            return Err(ChurnError::Config("analysis.days must be at least 1".into()));
        }
        if self.analysis.depth_per_day == 0 {
            return Err(ChurnError::Config(
                "analysis.depth_per_day must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Analysis window and acquisition settings.
///
/// # Examples
///
/// ```
/// use churnrate_core::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.depth_per_day, 35);
/// assert!(config.timeout().is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Length of the rolling window in days (default: 28).
    #[serde(default = "default_days")]
    pub days: u32,
    /// Commits fetched per day of window when cloning (default: 35).
    ///
    /// Repositories committing more often than this are under-fetched, which
    /// moves the apparent earliest commit forward.
    #[serde(default = "default_depth_per_day")]
    pub depth_per_day: u32,
    /// Abort the analysis of a single repository after this many seconds.
    pub timeout_secs: Option<u64>,
}

impl AnalysisConfig {
    /// The configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_days() -> u32 {
    28
}

fn default_depth_per_day() -> u32 {
    35
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            depth_per_day: default_depth_per_day(),
            timeout_secs: None,
        }
    }
}

/// Organization mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConfig {
    /// How many of the most recently pushed repositories to analyze (default: 10).
    #[serde(default = "default_org_limit")]
    pub limit: usize,
    /// Include forked repositories (default: false).
    #[serde(default)]
    pub include_forks: bool,
    /// GitHub token; falls back to `GITHUB_TOKEN` / `GH_TOKEN`.
    pub token: Option<String>,
}

fn default_org_limit() -> usize {
    10
}

impl Default for OrgConfig {
    fn default() -> Self {
        Self {
            limit: default_org_limit(),
            include_forks: false,
            token: None,
        }
    }
}
