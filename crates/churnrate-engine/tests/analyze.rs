//! End-to-end analysis against throwaway repositories with pinned commit times.

use std::num::NonZeroU32;
use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use churnrate_core::ChurnError;
use churnrate_engine::{analyze_at, AnalysisOptions};
use git2::{Repository, Signature, Time};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Fixture {
    dir: TempDir,
    repo: Repository,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn location(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    /// Write `files` and commit them with committer time `when`.
    fn commit(&self, files: &[(&str, Vec<u8>)], when: DateTime<Utc>) {
        let mut index = self.repo.index().unwrap();
        for (name, content) in files {
            std::fs::write(self.path().join(name), content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::new("Tester", "tester@example.com", &Time::new(when.timestamp(), 0))
            .unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| self.repo.find_commit(oid).unwrap());
        let parents: Vec<_> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, "change", &tree, &parents)
            .unwrap();
    }
}

fn lines(n: usize) -> Vec<u8> {
    (0..n).map(|i| format!("line {i}\n")).collect::<String>().into_bytes()
}

fn png() -> Vec<u8> {
    b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR".to_vec()
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn options(days: u32) -> AnalysisOptions {
    AnalysisOptions::new(NonZeroU32::new(days).unwrap())
}

/// Window of 28 days ending Sunday 2024-03-31 12:00 starts 2024-03-03 12:00.
fn now() -> DateTime<Utc> {
    at(2024, 3, 31, 12)
}

fn steady_repo() -> Fixture {
    let fx = Fixture::new();
    fx.commit(&[("a.txt", lines(10))], at(2023, 1, 2, 9));
    fx.commit(
        &[("a.txt", lines(15)), ("b.txt", lines(3))],
        at(2024, 3, 12, 10),
    );
    fx.commit(&[("a.txt", lines(13))], at(2024, 3, 20, 10));
    fx
}

#[tokio::test]
async fn weekly_churn_for_steady_repository() {
    let fx = steady_repo();
    let result = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.codebase_size, 16);
    assert_eq!(result.git_depth, 28 * 35);
    assert_eq!(result.earliest_commit, at(2023, 1, 2, 9));
    assert!(!result.excluded_bootstrap_week);

    assert_eq!(result.weekly_buckets.len(), 2);
    let first = &result.weekly_buckets[0];
    assert_eq!(first.week_start, date(2024, 3, 11));
    assert_eq!((first.additions, first.deletions), (8, 0));
    let second = &result.weekly_buckets[1];
    assert_eq!(second.week_start, date(2024, 3, 18));
    assert_eq!((second.additions, second.deletions), (0, 2));

    assert_eq!(result.rates.total_churn, 10);
    assert_eq!(result.rates.avg_weekly_churn, 5);
    assert!((result.rates.weekly_churn_rate - 31.25).abs() < 1e-9);
    assert!((result.rates.total_churn_rate - 62.5).abs() < 1e-9);
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let fx = steady_repo();
    let cancel = CancellationToken::new();
    let first = analyze_at(&fx.location(), &options(28), now(), &cancel)
        .await
        .unwrap();
    let second = analyze_at(&fx.location(), &options(28), now(), &cancel)
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn young_repository_drops_bootstrap_week() {
    let fx = Fixture::new();
    fx.commit(&[("a.txt", lines(100))], at(2024, 3, 5, 9));
    fx.commit(&[("a.txt", lines(101))], at(2024, 3, 13, 9));

    let result = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.excluded_bootstrap_week);
    assert_eq!(result.bootstrap_week.start, date(2024, 3, 4));
    assert_eq!(result.weekly_buckets.len(), 1);
    assert_eq!(result.weekly_buckets[0].week_start, date(2024, 3, 11));
    assert_eq!(result.rates.total_churn, 1);
}

#[tokio::test]
async fn window_inside_bootstrap_week_fails() {
    let fx = Fixture::new();
    fx.commit(&[("a.txt", lines(40))], at(2024, 3, 4, 10));
    fx.commit(&[("a.txt", lines(45))], at(2024, 3, 6, 10));

    let err = analyze_at(
        &fx.location(),
        &options(3),
        at(2024, 3, 8, 12),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ChurnError::NoHistoryInWindow { window_days: 3 }), "got {err:?}");
}

#[tokio::test]
async fn empty_files_are_an_empty_codebase() {
    let fx = Fixture::new();
    fx.commit(&[("empty.txt", Vec::new())], at(2024, 3, 20, 10));

    let err = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChurnError::EmptyCodebase(_)), "got {err:?}");
}

#[tokio::test]
async fn commit_at_window_start_is_counted() {
    let fx = Fixture::new();
    fx.commit(&[("a.txt", lines(10))], at(2023, 6, 1, 9));
    fx.commit(&[("a.txt", lines(14))], at(2024, 3, 3, 12));

    let result = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.weekly_buckets.len(), 1);
    assert_eq!(result.weekly_buckets[0].week_start, date(2024, 2, 26));
    assert_eq!(result.weekly_buckets[0].additions, 4);
}

#[tokio::test]
async fn binary_files_are_skipped_everywhere() {
    let fx = Fixture::new();
    fx.commit(&[("a.txt", lines(10))], at(2023, 6, 1, 9));
    fx.commit(
        &[("b.txt", lines(3)), ("logo.png", png())],
        at(2024, 3, 14, 9),
    );

    let result = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.codebase_size, 13);
    assert_eq!(result.rates.total_churn, 3);
}

#[tokio::test]
async fn plain_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = analyze_at(
        &dir.path().to_string_lossy(),
        &options(28),
        now(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ChurnError::NotARepository(_)), "got {err:?}");
}

#[tokio::test]
async fn cancelled_run_stops() {
    let fx = steady_repo();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = analyze_at(&fx.location(), &options(28), now(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ChurnError::Cancelled), "got {err:?}");
}

#[tokio::test]
async fn shallow_clone_matches_local_checkout() {
    let fx = steady_repo();
    let url = format!("file://{}", fx.path().display());

    let local = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();
    let cloned = analyze_at(&url, &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(cloned.codebase_size, local.codebase_size);
    assert_eq!(cloned.weekly_buckets, local.weekly_buckets);
    assert_eq!(cloned.rates, local.rates);
    assert_eq!(cloned.location, url);
}

#[tokio::test]
async fn binary_only_week_still_counts_as_a_week() {
    let fx = Fixture::new();
    fx.commit(&[("a.txt", lines(10))], at(2023, 1, 2, 9));
    fx.commit(&[("a.txt", lines(30))], at(2024, 3, 12, 10));
    fx.commit(&[("logo.png", png())], at(2024, 3, 20, 10));

    let result = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.weekly_buckets.len(), 2);
    assert_eq!(result.weekly_buckets[1].week_start, date(2024, 3, 18));
    assert_eq!(result.weekly_buckets[1].total(), 0);
    assert_eq!(result.rates.total_churn, 20);
    assert_eq!(result.rates.avg_weekly_churn, 10);
}

#[tokio::test]
async fn binary_only_window_is_zero_churn() {
    let fx = Fixture::new();
    fx.commit(&[("a.txt", lines(10))], at(2023, 1, 2, 9));
    fx.commit(&[("logo.png", png())], at(2024, 3, 20, 10));

    let result = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.weekly_buckets.len(), 1);
    assert_eq!(result.weekly_buckets[0].total(), 0);
    assert_eq!(result.rates.total_churn, 0);
    assert_eq!(result.rates.avg_weekly_churn, 0);
    assert_eq!(result.rates.weekly_churn_rate, 0.0);
}

#[tokio::test]
async fn commit_dated_after_now_is_counted() {
    let fx = steady_repo();
    fx.commit(&[("a.txt", lines(16))], at(2024, 4, 2, 10));

    let result = analyze_at(&fx.location(), &options(28), now(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.weekly_buckets.len(), 3);
    assert_eq!(result.weekly_buckets[2].week_start, date(2024, 4, 1));
    assert_eq!(result.weekly_buckets[2].additions, 3);
    assert_eq!(result.rates.total_churn, 13);
}
