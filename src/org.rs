//! Organization mode: analyze several repositories one after the other.

use chrono::{DateTime, Utc};
use churnrate_core::ChurnError;
use churnrate_engine::{analyze_at, AnalysisOptions, AnalysisResult};
use churnrate_org::OrgRepo;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A successfully analyzed repository.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoReport {
    pub name: String,
    pub result: AnalysisResult,
}

/// A repository whose analysis failed; the run carried on without it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoFailure {
    pub name: String,
    pub error: String,
}

/// Aggregates over the successfully analyzed repositories.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgSummary {
    pub repositories_analyzed: usize,
    pub total_codebase_size: u64,
    /// Sum of each repository's average weekly churn.
    pub total_avg_weekly_churn: u64,
    /// Unweighted mean of the per-repository weekly churn rates.
    pub mean_weekly_churn_rate: f64,
}

/// Outcome of an organization run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgReport {
    pub org: String,
    pub window_days: u32,
    /// `None` when no repository could be analyzed.
    pub summary: Option<OrgSummary>,
    pub repositories: Vec<RepoReport>,
    pub failures: Vec<RepoFailure>,
}

impl OrgReport {
    pub fn new(
        org: String,
        window_days: u32,
        repositories: Vec<RepoReport>,
        failures: Vec<RepoFailure>,
    ) -> Self {
        let summary = summarize(&repositories);
        Self {
            org,
            window_days,
            summary,
            repositories,
            failures,
        }
    }

    /// Analyzed repositories, highest weekly churn rate first.
    pub fn by_weekly_rate(&self) -> Vec<&RepoReport> {
        let mut sorted: Vec<&RepoReport> = self.repositories.iter().collect();
        sorted.sort_by(|a, b| {
            b.result
                .rates
                .weekly_churn_rate
                .total_cmp(&a.result.rates.weekly_churn_rate)
        });
        sorted
    }
}

fn summarize(repositories: &[RepoReport]) -> Option<OrgSummary> {
    if repositories.is_empty() {
        return None;
    }
    let rate_sum: f64 = repositories
        .iter()
        .map(|r| r.result.rates.weekly_churn_rate)
        .sum();
    Some(OrgSummary {
        repositories_analyzed: repositories.len(),
        total_codebase_size: repositories.iter().map(|r| r.result.codebase_size).sum(),
        total_avg_weekly_churn: repositories
            .iter()
            .map(|r| r.result.rates.avg_weekly_churn)
            .sum(),
        mean_weekly_churn_rate: rate_sum / repositories.len() as f64,
    })
}

/// Progress notifications emitted while an organization run proceeds.
pub enum OrgProgress<'a> {
    /// About to analyze `repo`, the `index`-th (1-based) of `total`.
    Started {
        index: usize,
        total: usize,
        repo: &'a OrgRepo,
    },
    Finished(&'a RepoReport),
    Failed(&'a RepoFailure),
}

/// Analyze `targets` in order over the window ending at `now`.
///
/// A failing repository is logged and recorded, and the run continues.
/// Cancellation stops the whole run.
///
/// # Errors
///
/// Returns [`ChurnError::Cancelled`] if `cancel` fires.
pub async fn analyze_targets(
    org: &str,
    targets: &[OrgRepo],
    options: &AnalysisOptions,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(OrgProgress<'_>),
) -> Result<OrgReport, ChurnError> {
    let mut repositories = Vec::with_capacity(targets.len());
    let mut failures = Vec::new();

    for (i, repo) in targets.iter().enumerate() {
        on_progress(OrgProgress::Started {
            index: i + 1,
            total: targets.len(),
            repo,
        });

        match analyze_at(&repo.clone_url, options, now, cancel).await {
            Ok(result) => {
                repositories.push(RepoReport {
                    name: repo.name.clone(),
                    result,
                });
                if let Some(report) = repositories.last() {
                    on_progress(OrgProgress::Finished(report));
                }
            }
            Err(ChurnError::Cancelled) => return Err(ChurnError::Cancelled),
            Err(e) => {
                warn!(repo = %repo.name, error = %e, "skipping repository");
                failures.push(RepoFailure {
                    name: repo.name.clone(),
                    error: e.to_string(),
                });
                if let Some(failure) = failures.last() {
                    on_progress(OrgProgress::Failed(failure));
                }
            }
        }
    }

    Ok(OrgReport::new(
        org.to_string(),
        options.window_days.get(),
        repositories,
        failures,
    ))
}
