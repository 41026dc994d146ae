//! Churn rates relative to codebase size.

use std::num::NonZeroU64;

use serde::Serialize;

use crate::weekly::WeeklyBucket;

/// Churn statistics over the retained weeks.
///
/// Rates are percentages of the codebase size and are not clamped: a
/// codebase rewritten more than once in the window exceeds 100%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnRates {
    /// Sum of additions and deletions over all buckets.
    pub total_churn: u64,
    /// `total_churn / weeks`, rounded half up.
    pub avg_weekly_churn: u64,
    /// `avg_weekly_churn / codebase_size × 100`.
    pub weekly_churn_rate: f64,
    /// `total_churn / codebase_size × 100`.
    pub total_churn_rate: f64,
}

/// Compute churn rates for `buckets` against `codebase_size` lines.
///
/// Returns `None` if `buckets` is empty.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU64;
/// use chrono::NaiveDate;
/// use churnrate_engine::rates::compute_rates;
/// use churnrate_engine::weekly::WeeklyBucket;
///
/// let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let buckets = [
///     WeeklyBucket { week_start: monday, additions: 100, deletions: 50 },
///     WeeklyBucket { week_start: monday + chrono::Days::new(7), additions: 20, deletions: 10 },
/// ];
/// let rates = compute_rates(&buckets, NonZeroU64::new(1000).unwrap()).unwrap();
/// assert_eq!(rates.total_churn, 180);
/// assert_eq!(rates.avg_weekly_churn, 90);
/// assert_eq!(format!("{:.2}", rates.weekly_churn_rate), "9.00");
/// assert_eq!(format!("{:.2}", rates.total_churn_rate), "18.00");
/// ```
pub fn compute_rates(buckets: &[WeeklyBucket], codebase_size: NonZeroU64) -> Option<ChurnRates> {
    let weeks = u64::try_from(buckets.len()).ok().filter(|&n| n > 0)?;
    let total_churn: u64 = buckets.iter().map(WeeklyBucket::total).sum();
    let avg_weekly_churn = (total_churn + weeks / 2) / weeks;
    let size = codebase_size.get() as f64;

    Some(ChurnRates {
        total_churn,
        avg_weekly_churn,
        weekly_churn_rate: avg_weekly_churn as f64 / size * 100.0,
        total_churn_rate: total_churn as f64 / size * 100.0,
    })
}
