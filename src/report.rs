//! Report rendering for single-repository and organization runs.

use std::fmt::Write;

use churnrate_engine::weekly::WeeklyBucket;
use churnrate_engine::AnalysisResult;

use crate::org::OrgReport;

/// Weeks listed in the "highest churn" section.
pub const TOP_WEEKS: usize = 5;

const RULE: &str = "  ─────────────────────────────────────────────────────────";

/// Format `n` with comma thousands separators.
///
/// ```text
/// 1234567 -> "1,234,567"
/// ```
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn banner(out: &mut String, title: &str) {
    let _ = writeln!(out, "╔════════════════════════════════════════════════════════════╗");
    let _ = writeln!(out, "║ {title:^58} ║");
    let _ = writeln!(out, "╚════════════════════════════════════════════════════════════╝");
}

fn week_line(bucket: &WeeklyBucket) -> String {
    format!(
        "{}  +{} -{}  ({} total)",
        bucket.week_start.format("%Y-%m-%d"),
        format_number(bucket.additions),
        format_number(bucket.deletions),
        format_number(bucket.total()),
    )
}

/// Boxed console report for one repository.
pub fn repo_text(name: &str, result: &AnalysisResult) -> String {
    let mut out = String::new();
    banner(&mut out, "Git Repository Churn Analysis");
    out.push('\n');

    let _ = writeln!(out, "  Repository:           {name}");
    let _ = writeln!(
        out,
        "  Codebase Size:        {} lines",
        format_number(result.codebase_size)
    );
    let _ = writeln!(
        out,
        "  Git Depth:            {} commits (earliest: {})",
        result.git_depth,
        result.earliest_commit.format("%Y-%m-%d")
    );
    let _ = writeln!(
        out,
        "  Analysis Window:      {} days ({} weeks)",
        result.window.days,
        result.window.days / 7
    );
    if result.excluded_bootstrap_week {
        let _ = writeln!(
            out,
            "  First Week Excluded:  {} to {}",
            result.bootstrap_week.start.format("%Y-%m-%d"),
            result.bootstrap_week.last_day().format("%Y-%m-%d")
        );
    }

    let rates = &result.rates;
    let _ = writeln!(out, "\n{RULE}\n");
    let _ = writeln!(
        out,
        "  Total Churn:          {} lines changed",
        format_number(rates.total_churn)
    );
    let _ = writeln!(out, "  Total Churn Rate:     {:.2}%", rates.total_churn_rate);
    out.push('\n');
    let _ = writeln!(
        out,
        "  Average Weekly Churn: {} lines/week",
        format_number(rates.avg_weekly_churn)
    );
    let _ = writeln!(out, "  Weekly Churn Rate:    {:.2}%", rates.weekly_churn_rate);
    let _ = writeln!(out, "\n{RULE}\n");

    let top = result.top_weeks(TOP_WEEKS);
    let _ = writeln!(out, "  Top {} Highest Churn Weeks:\n", top.len());
    for bucket in &top {
        let _ = writeln!(out, "    {}", week_line(bucket));
    }
    out
}

/// Markdown report for one repository, headed at `level`.
pub fn repo_markdown(name: &str, result: &AnalysisResult, level: usize) -> String {
    let hashes = "#".repeat(level.max(1));
    let rates = &result.rates;
    let mut out = String::new();

    let _ = writeln!(out, "{hashes} Churn: `{name}`\n");
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|--------|-------|");
    let _ = writeln!(
        out,
        "| Codebase size | {} lines |",
        format_number(result.codebase_size)
    );
    let _ = writeln!(
        out,
        "| Git depth | {} commits (earliest {}) |",
        result.git_depth,
        result.earliest_commit.format("%Y-%m-%d")
    );
    let _ = writeln!(
        out,
        "| Window | {} days ({} weeks) |",
        result.window.days,
        result.window.days / 7
    );
    if result.excluded_bootstrap_week {
        let _ = writeln!(
            out,
            "| First week excluded | {} to {} |",
            result.bootstrap_week.start.format("%Y-%m-%d"),
            result.bootstrap_week.last_day().format("%Y-%m-%d")
        );
    }
    let _ = writeln!(
        out,
        "| Total churn | {} lines |",
        format_number(rates.total_churn)
    );
    let _ = writeln!(out, "| Total churn rate | {:.2}% |", rates.total_churn_rate);
    let _ = writeln!(
        out,
        "| Average weekly churn | {} lines/week |",
        format_number(rates.avg_weekly_churn)
    );
    let _ = writeln!(out, "| Weekly churn rate | {:.2}% |", rates.weekly_churn_rate);

    let top = result.top_weeks(TOP_WEEKS);
    let _ = writeln!(out, "\n**Top {} highest churn weeks**\n", top.len());
    for bucket in &top {
        let _ = writeln!(out, "- {}", week_line(bucket));
    }
    out
}

/// Console summary for an organization run.
pub fn org_text(report: &OrgReport) -> String {
    let mut out = String::new();
    banner(&mut out, &format!("Organization Summary: {}", report.org));
    out.push('\n');

    let Some(summary) = &report.summary else {
        let _ = writeln!(out, "  No repositories could be analyzed.");
        failures_text(&mut out, report);
        return out;
    };

    let _ = writeln!(
        out,
        "  Repositories Analyzed:       {}",
        summary.repositories_analyzed
    );
    let _ = writeln!(
        out,
        "  Total Codebase Size:         {} lines",
        format_number(summary.total_codebase_size)
    );
    let _ = writeln!(
        out,
        "  Total Avg Weekly Churn:      {} lines/week",
        format_number(summary.total_avg_weekly_churn)
    );
    let _ = writeln!(out, "  Analysis Window:             {} days", report.window_days);
    let _ = writeln!(out, "\n{RULE}\n");
    let _ = writeln!(
        out,
        "  Average Weekly Churn Rate:   {:.2}%",
        summary.mean_weekly_churn_rate
    );
    let _ = writeln!(out, "\n{RULE}\n");
    let _ = writeln!(out, "  Individual Repository Churn Rates:\n");
    for repo in report.by_weekly_rate() {
        let _ = writeln!(
            out,
            "    {:<30}  {:.2}%/week",
            repo.name, repo.result.rates.weekly_churn_rate
        );
    }
    failures_text(&mut out, report);
    out
}

fn failures_text(out: &mut String, report: &OrgReport) {
    if report.failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n  Failed ({}):\n", report.failures.len());
    for failure in &report.failures {
        let _ = writeln!(out, "    {:<30}  {}", failure.name, failure.error);
    }
}

/// Markdown document for an organization run, per-repository sections included.
pub fn org_markdown(report: &OrgReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Churn summary: {}\n", report.org);

    if let Some(summary) = &report.summary {
        let _ = writeln!(out, "| Metric | Value |");
        let _ = writeln!(out, "|--------|-------|");
        let _ = writeln!(
            out,
            "| Repositories analyzed | {} |",
            summary.repositories_analyzed
        );
        let _ = writeln!(
            out,
            "| Total codebase size | {} lines |",
            format_number(summary.total_codebase_size)
        );
        let _ = writeln!(
            out,
            "| Total average weekly churn | {} lines/week |",
            format_number(summary.total_avg_weekly_churn)
        );
        let _ = writeln!(out, "| Window | {} days |", report.window_days);
        let _ = writeln!(
            out,
            "| Average weekly churn rate | {:.2}% |",
            summary.mean_weekly_churn_rate
        );

        let _ = writeln!(out, "\n| Repository | Weekly churn rate |");
        let _ = writeln!(out, "|------------|-------------------|");
        for repo in report.by_weekly_rate() {
            let _ = writeln!(
                out,
                "| {} | {:.2}% |",
                repo.name, repo.result.rates.weekly_churn_rate
            );
        }
    } else {
        let _ = writeln!(out, "No repositories could be analyzed.");
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "\n## Failures\n");
        for failure in &report.failures {
            let _ = writeln!(out, "- `{}`: {}", failure.name, failure.error);
        }
    }

    for repo in &report.repositories {
        out.push('\n');
        out.push_str(&repo_markdown(&repo.name, &repo.result, 2));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use chrono::{Days, NaiveDate, TimeZone, Utc};
    use churnrate_engine::rates::ChurnRates;
    use churnrate_engine::weekly::BootstrapWeek;
    use churnrate_engine::window::AnalysisWindow;

    use super::*;
    use crate::org::{RepoFailure, RepoReport};

    fn result(size: u64, weekly_rate: f64, excluded: bool) -> AnalysisResult {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let bucket = |w: u64, additions: u64, deletions: u64| WeeklyBucket {
            week_start: monday + Days::new(7 * w),
            additions,
            deletions,
        };
        AnalysisResult {
            location: "https://example.com/acme/widgets.git".into(),
            codebase_size: size,
            earliest_commit: Utc.with_ymd_and_hms(2024, 2, 27, 9, 0, 0).unwrap(),
            git_depth: 980,
            window: AnalysisWindow::ending_at(now, NonZeroU32::new(28).unwrap()),
            bootstrap_week: BootstrapWeek::containing(
                Utc.with_ymd_and_hms(2024, 2, 27, 9, 0, 0).unwrap(),
            ),
            excluded_bootstrap_week: excluded,
            weekly_buckets: vec![bucket(0, 1200, 300), bucket(1, 40, 2), bucket(2, 7, 9000)],
            rates: ChurnRates {
                total_churn: 10_549,
                avg_weekly_churn: 3516,
                weekly_churn_rate: weekly_rate,
                total_churn_rate: 8.4392,
            },
        }
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(65_536), "65,536");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn text_report_fields() {
        let text = repo_text("widgets", &result(125_000, 2.8128, false));
        assert!(text.contains("Repository:           widgets"));
        assert!(text.contains("125,000 lines"));
        assert!(text.contains("980 commits (earliest: 2024-02-27)"));
        assert!(text.contains("28 days (4 weeks)"));
        assert!(text.contains("Total Churn Rate:     8.44%"));
        assert!(text.contains("Weekly Churn Rate:    2.81%"));
        assert!(text.contains("3,516 lines/week"));
        assert!(!text.contains("First Week Excluded"));
    }

    #[test]
    fn text_report_top_weeks_in_order() {
        let text = repo_text("widgets", &result(125_000, 2.8, false));
        assert!(text.contains("Top 3 Highest Churn Weeks"));
        let first = text.find("2024-03-18  +7 -9,000  (9,007 total)").unwrap();
        let second = text.find("2024-03-04  +1,200 -300  (1,500 total)").unwrap();
        assert!(first < second);
    }

    #[test]
    fn excluded_week_range_is_shown() {
        let text = repo_text("widgets", &result(125_000, 2.8, true));
        assert!(text.contains("First Week Excluded:  2024-02-26 to 2024-03-03"));
        let md = repo_markdown("widgets", &result(125_000, 2.8, true), 1);
        assert!(md.contains("| First week excluded | 2024-02-26 to 2024-03-03 |"));
    }

    #[test]
    fn markdown_report_heading_level() {
        let md = repo_markdown("widgets", &result(10, 1.0, false), 2);
        assert!(md.starts_with("## Churn: `widgets`"));
        assert!(md.contains("| Weekly churn rate | 1.00% |"));
    }

    fn org_report() -> OrgReport {
        OrgReport::new(
            "acme".into(),
            28,
            vec![
                RepoReport {
                    name: "calm".into(),
                    result: result(1000, 0.5, false),
                },
                RepoReport {
                    name: "busy".into(),
                    result: result(3000, 12.25, false),
                },
            ],
            vec![RepoFailure {
                name: "broken".into(),
                error: "not a git repository".into(),
            }],
        )
    }

    #[test]
    fn org_text_sorted_by_rate_with_failures() {
        let text = org_text(&org_report());
        assert!(text.contains("Repositories Analyzed:       2"));
        assert!(text.contains("4,000 lines"));
        assert!(text.contains("Average Weekly Churn Rate:   6.38%"));
        assert!(text.find("busy").unwrap() < text.find("calm").unwrap());
        assert!(text.contains("Failed (1)"));
        assert!(text.contains("broken"));
    }

    #[test]
    fn org_markdown_contains_sections() {
        let md = org_markdown(&org_report());
        assert!(md.starts_with("# Churn summary: acme"));
        assert!(md.contains("| busy | 12.25% |"));
        assert!(md.contains("## Failures"));
        assert!(md.contains("## Churn: `calm`"));
    }

    #[test]
    fn org_text_without_successes() {
        let report = OrgReport::new(
            "acme".into(),
            28,
            Vec::new(),
            vec![RepoFailure {
                name: "broken".into(),
                error: "boom".into(),
            }],
        );
        let text = org_text(&report);
        assert!(text.contains("No repositories could be analyzed."));
        assert!(text.contains("boom"));
    }
}
