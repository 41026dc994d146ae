//! ISO-week bucketing and bootstrap-week exclusion.
//!
//! The week containing a repository's first commit is usually a bulk import
//! and says nothing about ongoing churn. When that week reaches into the
//! analysis window, every bucket starting before its end is dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use churnrate_core::ChurnError;
use serde::Serialize;

use crate::history::{ChangeEvent, HistoryRecord};
use crate::window::AnalysisWindow;

/// ISO-8601 `(year, week)` pair identifying a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekKey {
    /// ISO week-numbering year (may differ from the calendar year).
    pub iso_year: i32,
    /// ISO week number, 1–53.
    pub iso_week: u32,
}

impl WeekKey {
    /// The ISO week containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        let week = date.iso_week();
        Self {
            iso_year: week.year(),
            iso_week: week.week(),
        }
    }
}

/// Monday of the ISO week containing `date`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use churnrate_engine::weekly::week_start;
///
/// let thursday = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
/// assert_eq!(week_start(thursday), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
/// ```
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Lines added and removed during one ISO week.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use churnrate_engine::weekly::WeeklyBucket;
///
/// let bucket = WeeklyBucket {
///     week_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     additions: 100,
///     deletions: 50,
/// };
/// assert_eq!(bucket.total(), 150);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyBucket {
    /// Monday the week starts on.
    pub week_start: NaiveDate,
    /// Lines added.
    pub additions: u64,
    /// Lines removed.
    pub deletions: u64,
}

impl WeeklyBucket {
    /// Additions plus deletions.
    pub fn total(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// The ISO week containing the earliest known commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapWeek {
    /// ISO week of the earliest commit.
    pub key: WeekKey,
    /// Monday of that week.
    pub start: NaiveDate,
    /// Monday of the following week (exclusive end).
    pub end: NaiveDate,
}

impl BootstrapWeek {
    /// The bootstrap week for a repository whose first commit is `earliest`.
    pub fn containing(earliest: DateTime<Utc>) -> Self {
        let date = earliest.date_naive();
        let start = week_start(date);
        Self {
            key: WeekKey::of(date),
            start,
            end: start + Days::new(7),
        }
    }

    /// Sunday, the last day of the week.
    pub fn last_day(&self) -> NaiveDate {
        self.end - Days::new(1)
    }

    /// Returns `true` if the week ends after `window` starts.
    pub fn overlaps(&self, window: &AnalysisWindow) -> bool {
        midnight_utc(self.end) > window.start
    }
}

/// Retained buckets after bootstrap exclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyChurn {
    /// Buckets ordered by week.
    pub buckets: Vec<WeeklyBucket>,
    /// Whether the bootstrap-week rule applied to this window.
    pub excluded_bootstrap_week: bool,
}

/// Accumulates commits and change events into per-week buckets.
///
/// A week becomes a bucket as soon as it holds a commit, even one that
/// changed no countable lines.
#[derive(Debug, Default)]
pub struct WeeklyAggregator {
    buckets: BTreeMap<WeekKey, WeeklyBucket>,
}

impl WeeklyAggregator {
    /// An empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_mut(&mut self, at: DateTime<Utc>) -> &mut WeeklyBucket {
        let date = at.date_naive();
        self.buckets
            .entry(WeekKey::of(date))
            .or_insert_with(|| WeeklyBucket {
                week_start: week_start(date),
                additions: 0,
                deletions: 0,
            })
    }

    /// Open the bucket of the week a commit at `at` belongs to.
    pub fn record_commit(&mut self, at: DateTime<Utc>) {
        self.bucket_mut(at);
    }

    /// Add one event to the bucket of its ISO week.
    pub fn record(&mut self, event: &ChangeEvent) {
        let bucket = self.bucket_mut(event.timestamp);
        bucket.additions += event.additions;
        bucket.deletions += event.deletions;
    }

    /// Number of distinct weeks seen so far.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no commit has been recorded.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Apply the bootstrap-week rule and return the retained buckets.
    ///
    /// A bucket is dropped when it starts before the bootstrap week ends and
    /// the bootstrap week ends after the window starts.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnError::NoHistoryInWindow`] if no bucket survives.
    pub fn finish(
        self,
        bootstrap: &BootstrapWeek,
        window: &AnalysisWindow,
    ) -> Result<WeeklyChurn, ChurnError> {
        let excluded_bootstrap_week = bootstrap.overlaps(window);
        let bootstrap_end = midnight_utc(bootstrap.end);

        let buckets: Vec<WeeklyBucket> = self
            .buckets
            .into_values()
            .filter(|b| !(excluded_bootstrap_week && midnight_utc(b.week_start) < bootstrap_end))
            .collect();

        if buckets.is_empty() {
            return Err(ChurnError::NoHistoryInWindow {
                window_days: window.days,
            });
        }

        Ok(WeeklyChurn {
            buckets,
            excluded_bootstrap_week,
        })
    }
}

impl Extend<HistoryRecord> for WeeklyAggregator {
    fn extend<I: IntoIterator<Item = HistoryRecord>>(&mut self, iter: I) {
        for record in iter {
            match record {
                HistoryRecord::Commit(at) => self.record_commit(at),
                HistoryRecord::Change(event) => self.record(&event),
            }
        }
    }
}
