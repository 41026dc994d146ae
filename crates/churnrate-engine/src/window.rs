use std::num::NonZeroU32;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// The rolling time range an analysis covers, starting at `start` inclusive.
///
/// `end` is the analysis clock. It is reported but not enforced: commits
/// dated after it (clock skew) still belong to the window.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU32;
/// use chrono::{TimeZone, Utc};
/// use churnrate_engine::window::AnalysisWindow;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 29, 12, 0, 0).unwrap();
/// let window = AnalysisWindow::ending_at(now, NonZeroU32::new(28).unwrap());
/// assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
/// assert!(window.admits(now));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisWindow {
    /// Earliest included instant.
    pub start: DateTime<Utc>,
    /// The analysis clock.
    pub end: DateTime<Utc>,
    /// Window length in days.
    pub days: u32,
}

impl AnalysisWindow {
    /// The window of `days` days ending at `now`.
    pub fn ending_at(now: DateTime<Utc>, days: NonZeroU32) -> Self {
        Self {
            start: now - Duration::days(i64::from(days.get())),
            end: now,
            days: days.get(),
        }
    }

    /// Returns `true` if a commit at `at` counts towards the window.
    pub fn admits(&self, at: DateTime<Utc>) -> bool {
        self.start <= at
    }
}
