//! Code churn analysis over a rolling window of git history.
//!
//! Acquires a repository (local working tree or shallow clone), measures its
//! current size in lines, buckets the window's added/deleted lines into ISO
//! weeks, and expresses the churn as a percentage of the codebase.
//!
//! ```no_run
//! use churnrate_engine::{analyze, AnalysisOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), churnrate_core::ChurnError> {
//! let result = analyze(".", &AnalysisOptions::default(), &CancellationToken::new()).await?;
//! println!("{:.2}% per week", result.rates.weekly_churn_rate);
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod history;
pub mod process;
pub mod rates;
pub mod sizer;
pub mod weekly;
pub mod window;

use std::num::{NonZeroU32, NonZeroU64};
use std::time::Duration;

use chrono::{DateTime, Utc};
use churnrate_core::{AnalysisConfig, ChurnError};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::acquire::RepoLocator;
use crate::rates::ChurnRates;
use crate::weekly::{BootstrapWeek, WeeklyAggregator, WeeklyBucket};
use crate::window::AnalysisWindow;

/// Default window length in days.
pub const DEFAULT_WINDOW_DAYS: NonZeroU32 = match NonZeroU32::new(28) {
    Some(days) => days,
    None => panic!("window must be non-zero"),
};

/// Default commits fetched per day of window when cloning.
pub const DEFAULT_DEPTH_PER_DAY: NonZeroU32 = match NonZeroU32::new(35) {
    Some(depth) => depth,
    None => panic!("depth must be non-zero"),
};

/// Parameters of one analysis run.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU32;
/// use churnrate_engine::AnalysisOptions;
///
/// let opts = AnalysisOptions::new(NonZeroU32::new(28).unwrap());
/// assert_eq!(opts.git_depth(), 28 * 35);
/// ```
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Window length in days.
    pub window_days: NonZeroU32,
    /// Clone depth per day of window. A heuristic: repositories that commit
    /// more often than this are under-fetched.
    pub depth_per_day: NonZeroU32,
    /// Abort the run after this long.
    pub timeout: Option<Duration>,
}

impl AnalysisOptions {
    /// Options for a `window_days` window with the default depth heuristic.
    pub fn new(window_days: NonZeroU32) -> Self {
        Self {
            window_days,
            ..Self::default()
        }
    }

    /// Build options from the `[analysis]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnError::Config`] if `days` or `depth_per_day` is zero.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ChurnError> {
        let window_days = NonZeroU32::new(config.days)
            .ok_or_else(|| ChurnError::Config("window must be at least one day".into()))?;
        let depth_per_day = NonZeroU32::new(config.depth_per_day)
            .ok_or_else(|| ChurnError::Config("depth per day must be at least 1".into()))?;
        Ok(Self {
            window_days,
            depth_per_day,
            timeout: config.timeout(),
        })
    }

    /// Requested clone depth: `window_days × depth_per_day`.
    pub fn git_depth(&self) -> u64 {
        u64::from(self.window_days.get()) * u64::from(self.depth_per_day.get())
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            depth_per_day: DEFAULT_DEPTH_PER_DAY,
            timeout: None,
        }
    }
}

/// Outcome of analyzing one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// The path or URL that was analyzed.
    pub location: String,
    /// Lines across all tracked files; always positive.
    pub codebase_size: u64,
    /// Earliest commit in the acquired history.
    pub earliest_commit: DateTime<Utc>,
    /// Requested clone depth.
    pub git_depth: u64,
    /// The window analyzed.
    pub window: AnalysisWindow,
    /// ISO week of the earliest commit.
    pub bootstrap_week: BootstrapWeek,
    /// Whether the bootstrap week overlapped the window and was excluded.
    pub excluded_bootstrap_week: bool,
    /// Retained weeks, oldest first.
    pub weekly_buckets: Vec<WeeklyBucket>,
    /// Churn totals and rates.
    #[serde(flatten)]
    pub rates: ChurnRates,
}

impl AnalysisResult {
    /// The `n` weeks with the most churn, highest first.
    pub fn top_weeks(&self, n: usize) -> Vec<WeeklyBucket> {
        let mut weeks = self.weekly_buckets.clone();
        weeks.sort_by(|a, b| {
            b.total()
                .cmp(&a.total())
                .then(a.week_start.cmp(&b.week_start))
        });
        weeks.truncate(n);
        weeks
    }
}

/// Analyze `location` over the window ending now.
///
/// `location` is a path to a git working tree or a clone URL.
///
/// # Errors
///
/// See [`analyze_at`].
pub async fn analyze(
    location: &str,
    options: &AnalysisOptions,
    cancel: &CancellationToken,
) -> Result<AnalysisResult, ChurnError> {
    analyze_at(location, options, Utc::now(), cancel).await
}

/// Analyze `location` over the window ending at `now`.
///
/// Identical inputs against an unchanged repository give identical results.
/// The run stops early if `cancel` fires or `options.timeout` elapses; child
/// processes are killed and any temporary clone is removed.
///
/// # Errors
///
/// - [`ChurnError::AcquisitionFailed`] / [`ChurnError::NotARepository`] from acquisition.
/// - [`ChurnError::EmptyCodebase`] if tracked files hold no lines.
/// - [`ChurnError::NoHistoryInWindow`] if no week survives bootstrap exclusion.
/// - [`ChurnError::Git`] if history cannot be read.
/// - [`ChurnError::Cancelled`] / [`ChurnError::TimedOut`].
pub async fn analyze_at(
    location: &str,
    options: &AnalysisOptions,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<AnalysisResult, ChurnError> {
    let token = cancel.child_token();
    let run = async {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(ChurnError::Cancelled),
            result = run_analysis(location, options, now, &token) => result,
        }
    };

    let result = match options.timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .unwrap_or(Err(ChurnError::TimedOut(limit))),
        None => run.await,
    };
    // Stops a sizing pass still running on a blocking thread.
    token.cancel();
    result
}

async fn run_analysis(
    location: &str,
    options: &AnalysisOptions,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<AnalysisResult, ChurnError> {
    let locator = RepoLocator::parse(location);
    let git_depth = options.git_depth();
    let window = AnalysisWindow::ending_at(now, options.window_days);

    debug!(%locator, git_depth, window_start = %window.start, "acquiring repository");
    let snapshot = acquire::acquire(&locator, git_depth, cancel).await?;
    debug!(path = %snapshot.path().display(), transient = snapshot.is_transient(), "snapshot ready");

    let size_root = snapshot.path().to_path_buf();
    let size_cancel = cancel.clone();
    let sizing =
        tokio::task::spawn_blocking(move || sizer::codebase_size(&size_root, &size_cancel));
    let extraction = history::extract(snapshot.path(), &window, cancel);
    let (size, history) = tokio::join!(sizing, extraction);

    let size = size.map_err(|e| ChurnError::Io(std::io::Error::other(e)))??;
    let codebase_size =
        NonZeroU64::new(size).ok_or_else(|| ChurnError::EmptyCodebase(location.to_string()))?;
    let history = history?;

    let earliest_commit = history
        .earliest_commit
        .ok_or(ChurnError::NoHistoryInWindow {
            window_days: window.days,
        })?;
    let bootstrap_week = BootstrapWeek::containing(earliest_commit);

    let mut aggregator = WeeklyAggregator::new();
    let mut malformed = 0usize;
    aggregator.extend(
        history::parse_numstat(&history.numstat_log, window).filter_map(|record| {
            record
                .inspect_err(|line| {
                    malformed += 1;
                    trace!(line = line.line_number, content = %line.content, "skipped numstat line");
                })
                .ok()
        }),
    );
    if aggregator.is_empty() {
        debug!(window_start = %window.start, "no commits in window");
    }
    debug!(weeks = aggregator.len(), malformed, "aggregated history");

    let weekly = aggregator.finish(&bootstrap_week, &window)?;
    let rates = rates::compute_rates(&weekly.buckets, codebase_size).ok_or(
        ChurnError::NoHistoryInWindow {
            window_days: window.days,
        },
    )?;

    Ok(AnalysisResult {
        location: location.to_string(),
        codebase_size: codebase_size.get(),
        earliest_commit,
        git_depth,
        window,
        bootstrap_week,
        excluded_bootstrap_week: weekly.excluded_bootstrap_week,
        weekly_buckets: weekly.buckets,
        rates,
    })
}
