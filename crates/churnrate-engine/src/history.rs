//! Git history extraction via `git log`.
//!
//! Two queries are made: the timestamp of the earliest commit across all
//! refs, and a `--numstat` log restricted to the analysis window. The numstat
//! output is parsed lazily into [`HistoryRecord`]s: one per in-window commit
//! header and one per file stat. Lines that cannot be parsed come out as
//! [`MalformedLine`] items for the caller to skip.

use std::path::Path;

use chrono::{DateTime, Utc};
use churnrate_core::ChurnError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::process::GitCommand;
use crate::window::AnalysisWindow;

/// Line counts for one file in one commit.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use churnrate_engine::history::ChangeEvent;
///
/// let event = ChangeEvent {
///     timestamp: Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap(),
///     additions: 12,
///     deletions: 4,
/// };
/// assert_eq!(event.additions + event.deletions, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Committer timestamp of the commit.
    pub timestamp: DateTime<Utc>,
    /// Lines added to the file.
    pub additions: u64,
    /// Lines removed from the file.
    pub deletions: u64,
}

/// One item of a parsed numstat log.
///
/// Every in-window commit yields a [`HistoryRecord::Commit`] before its file
/// stats, so a commit without numeric stats (binary-only, merge, empty) still
/// marks its week as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRecord {
    /// An in-window commit header, by committer timestamp.
    Commit(DateTime<Utc>),
    /// Line counts for one file of the current commit.
    Change(ChangeEvent),
}

/// A numstat line that was neither a commit header nor a numeric stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-based line number in the log output.
    pub line_number: usize,
    /// The offending line.
    pub content: String,
}

/// Raw history needed for one analysis.
#[derive(Debug, Clone)]
pub struct History {
    /// Earliest commit reachable from any ref, if the repository has commits.
    pub earliest_commit: Option<DateTime<Utc>>,
    /// `git log --numstat` output for the window.
    pub numstat_log: String,
}

/// Run both history queries for the working tree at `root`.
///
/// # Errors
///
/// Returns [`ChurnError::Git`] if either `git log` fails or prints an
/// unparseable timestamp, or [`ChurnError::Cancelled`].
pub async fn extract(
    root: &Path,
    window: &AnalysisWindow,
    cancel: &CancellationToken,
) -> Result<History, ChurnError> {
    let earliest_commit = earliest_commit(root, cancel).await?;
    let numstat_log = numstat_log(root, window.start, cancel).await?;
    Ok(History {
        earliest_commit,
        numstat_log,
    })
}

/// Timestamp of the oldest commit reachable from any ref.
///
/// Not limited to the analysis window: the bootstrap week is derived from the
/// true origin of the (fetched) history.
///
/// # Errors
///
/// Returns [`ChurnError::Git`] on process failure or a malformed timestamp.
pub async fn earliest_commit(
    root: &Path,
    cancel: &CancellationToken,
) -> Result<Option<DateTime<Utc>>, ChurnError> {
    let output = GitCommand::new(["log", "--all", "--pretty=format:%ct"])
        .current_dir(root)
        .output(cancel)
        .await?;
    parse_earliest(&output)
}

/// Parse the output of `git log --pretty=format:%ct`, newest first.
///
/// # Errors
///
/// Returns [`ChurnError::Git`] if the oldest entry is not a Unix timestamp.
///
/// # Examples
///
/// ```
/// use churnrate_engine::history::parse_earliest;
///
/// let earliest = parse_earliest("1700000300\n1700000200\n1700000100\n").unwrap();
/// assert_eq!(earliest.unwrap().timestamp(), 1700000100);
/// assert!(parse_earliest("").unwrap().is_none());
/// ```
pub fn parse_earliest(output: &str) -> Result<Option<DateTime<Utc>>, ChurnError> {
    let Some(last) = output.lines().map(str::trim).rfind(|l| !l.is_empty()) else {
        return Ok(None);
    };
    let secs: i64 = last
        .parse()
        .map_err(|_| ChurnError::Git(format!("unexpected commit timestamp: {last:?}")))?;
    DateTime::from_timestamp(secs, 0)
        .map(Some)
        .ok_or_else(|| ChurnError::Git(format!("commit timestamp out of range: {secs}")))
}

async fn numstat_log(
    root: &Path,
    since: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<String, ChurnError> {
    let since_arg = format!("--since={}", since.format("%Y-%m-%d %H:%M:%S +0000"));
    let output = GitCommand::new([
        "log".to_string(),
        "--all".to_string(),
        "--numstat".to_string(),
        "--pretty=format:%ct".to_string(),
        since_arg,
    ])
    .current_dir(root)
    .output(cancel)
    .await?;
    debug!(bytes = output.len(), "read numstat log");
    Ok(output)
}

/// Parse `git log --numstat --pretty=format:%ct` output for `window`.
///
/// The lower bound is applied here as well as in `git log --since`: headers
/// and stats of commits older than the window never reach the caller. There
/// is no upper bound, so commits dated after the analysis clock still count.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU32;
/// use chrono::{TimeZone, Utc};
/// use churnrate_engine::history::{parse_numstat, HistoryRecord};
/// use churnrate_engine::window::AnalysisWindow;
///
/// let now = Utc.with_ymd_and_hms(2023, 11, 20, 0, 0, 0).unwrap();
/// let window = AnalysisWindow::ending_at(now, NonZeroU32::new(28).unwrap());
/// let log = "1700000000\n10\t2\tsrc/lib.rs\n-\t-\tlogo.png\n";
///
/// let records: Vec<_> = parse_numstat(log, window).collect();
/// assert_eq!(records.len(), 3);
/// assert!(matches!(records[0], Ok(HistoryRecord::Commit(_))));
/// assert!(matches!(records[1], Ok(HistoryRecord::Change(c)) if c.additions == 10));
/// assert!(records[2].is_err());
/// ```
pub fn parse_numstat(output: &str, window: AnalysisWindow) -> NumstatRecords<'_> {
    NumstatRecords {
        lines: output.lines().enumerate(),
        window,
        current: None,
    }
}

/// Lazy iterator over the commit and per-file records of a numstat log.
///
/// Created by [`parse_numstat`].
#[derive(Debug)]
pub struct NumstatRecords<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    window: AnalysisWindow,
    /// Timestamp of the commit being read, `None` while outside the window.
    current: Option<DateTime<Utc>>,
}

impl Iterator for NumstatRecords<'_> {
    type Item = Result<HistoryRecord, MalformedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, raw) in self.lines.by_ref() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Ok(secs) = line.parse::<i64>() {
                self.current =
                    DateTime::from_timestamp(secs, 0).filter(|t| self.window.admits(*t));
                match self.current {
                    Some(timestamp) => return Some(Ok(HistoryRecord::Commit(timestamp))),
                    None => continue,
                }
            }

            let Some(timestamp) = self.current else {
                continue;
            };

            let record = match parse_stat(line) {
                Some((additions, deletions)) => Ok(HistoryRecord::Change(ChangeEvent {
                    timestamp,
                    additions,
                    deletions,
                })),
                None => Err(MalformedLine {
                    line_number: idx + 1,
                    content: raw.to_string(),
                }),
            };
            return Some(record);
        }
        None
    }
}

/// Parse `<additions>\t<deletions>\t<path>`.
fn parse_stat(line: &str) -> Option<(u64, u64)> {
    let mut fields = line.splitn(3, '\t');
    let additions = fields.next()?.trim().parse().ok()?;
    let deletions = fields.next()?.trim().parse().ok()?;
    let path = fields.next()?;
    if path.trim().is_empty() {
        return None;
    }
    Some((additions, deletions))
}
