mod org;
mod report;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use churnrate_core::{AnalysisConfig, ChurnConfig, ChurnError, OutputFormat};
use churnrate_engine::AnalysisOptions;
use churnrate_org::{resolve_token, select_targets, GitHubClient};

use crate::org::{OrgProgress, OrgReport};

const CONFIG_FILE: &str = ".churnrate.toml";

#[derive(Parser)]
#[command(
    name = "git-churnrate",
    version,
    about = "Measure code churn over a rolling window of git history",
    long_about = "git-churnrate measures how much of a codebase changes per week.\n\n\
                   It counts the lines of every tracked file, buckets the added and deleted\n\
                   lines of recent commits into ISO weeks, and reports churn as a percentage\n\
                   of the codebase. A repository's first week is left out when it falls in\n\
                   the window, since initial imports are not churn.\n\n\
                   Examples:\n  \
                     git-churnrate analyze                       Analyze the current repository\n  \
                     git-churnrate analyze ../other --days 90    Analyze a local checkout\n  \
                     git-churnrate analyze https://github.com/o/r.git  Shallow-clone and analyze\n  \
                     git-churnrate org my-org --limit 5          Compare an organization's repos\n  \
                     git-churnrate init                          Write a .churnrate.toml template"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .churnrate.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for reports.\n\n\
                       Formats:\n  \
                         text      Boxed console report (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,

    /// Abort the analysis of a repository after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Commits fetched per day of window when cloning (default: 35)
    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u32).range(1..),
        long_help = "Commits fetched per day of window when cloning a URL.\n\n\
                       The clone depth is days x depth-per-day. Repositories that commit more\n\
                       often than this are under-fetched: the earliest fetched commit moves\n\
                       forward and may be mistaken for the repository's first week."
    )]
    depth_per_day: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one repository
    #[command(long_about = "Analyze one repository.\n\n\
        LOCATION is the root of a git working tree or a clone URL (https://, git@,\n\
        git://, ssh://, file://). URLs are shallow-cloned into a temporary directory\n\
        that is removed afterwards.\n\n\
        Examples:\n  git-churnrate analyze\n  git-churnrate analyze ~/src/project --days 56\n  git-churnrate analyze https://github.com/rust-lang/log.git --format json")]
    Analyze {
        /// Path or clone URL (default: current directory)
        #[arg(default_value = ".")]
        location: String,

        /// Window length in days (default: 28)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
    },
    /// Analyze the most recently pushed repositories of a GitHub organization
    #[command(long_about = "Analyze the most recently pushed repositories of a GitHub organization.\n\n\
        Lists the organization's repositories through the GitHub API, drops forks,\n\
        and analyzes the most recently pushed ones one after the other. A repository\n\
        that fails is reported and skipped. Uses GITHUB_TOKEN or GH_TOKEN when set;\n\
        public organizations also work anonymously under a lower rate limit.\n\n\
        Examples:\n  git-churnrate org rust-lang\n  git-churnrate org my-org --limit 25 --include-forks --format markdown")]
    Org {
        /// GitHub organization login
        org: String,

        /// Window length in days (default: 28)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,

        /// Maximum repositories to analyze (default: 10)
        #[arg(long)]
        limit: Option<usize>,

        /// Include forked repositories
        #[arg(long)]
        include_forks: bool,
    },
    /// Create a default .churnrate.toml configuration file
    #[command(long_about = "Create a default .churnrate.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .churnrate.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1m\x1b[33m~\x1b[0m \x1b[1mgit-churnrate\x1b[0m v{version}: how fast is your codebase changing?\n");

        println!("Quick start:");
        println!("  \x1b[36mgit-churnrate analyze\x1b[0m           Analyze the current repository");
        println!("  \x1b[36mgit-churnrate org <org>\x1b[0m         Compare a GitHub organization's repos");
        println!("  \x1b[36mgit-churnrate init\x1b[0m              Create a .churnrate.toml config file\n");

        println!("All commands:");
        println!("  \x1b[32manalyze\x1b[0m   Weekly churn and churn rate of one repository");
        println!("  \x1b[32morg\x1b[0m       Churn summary across an organization");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("git-churnrate v{version}: how fast is your codebase changing?\n");

        println!("Quick start:");
        println!("  git-churnrate analyze           Analyze the current repository");
        println!("  git-churnrate org <org>         Compare a GitHub organization's repos");
        println!("  git-churnrate init              Create a .churnrate.toml config file\n");

        println!("All commands:");
        println!("  analyze   Weekly churn and churn rate of one repository");
        println!("  org       Churn summary across an organization");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'git-churnrate <command> --help' for details.");
}

const DEFAULT_CONFIG: &str = r#"# git-churnrate configuration
# See: https://github.com/codeGROOVE-dev/git-churnrate

[analysis]
# Length of the rolling window in days
# days = 28
# Commits fetched per day of window when cloning a URL
# depth_per_day = 35
# Abort the analysis of a repository after this many seconds
# timeout_secs = 600

[org]
# Repositories analyzed per organization, most recently pushed first
# limit = 10
# include_forks = false
# GITHUB_TOKEN / GH_TOKEN take precedence over this value
# token = "ghp_..."
"#;

fn load_config(path: Option<&Path>) -> Result<ChurnConfig> {
    let config = match path {
        Some(path) => ChurnConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                ChurnConfig::from_file(default_path)?
            } else {
                ChurnConfig::default()
            }
        }
    };
    Ok(config)
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug output.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Layer command-line overrides on top of the `[analysis]` config section.
fn analysis_options(
    config: &AnalysisConfig,
    days: Option<u32>,
    depth_per_day: Option<u32>,
    timeout_secs: Option<u64>,
) -> Result<AnalysisOptions, ChurnError> {
    let mut layered = config.clone();
    if let Some(days) = days {
        layered.days = days;
    }
    if let Some(depth) = depth_per_day {
        layered.depth_per_day = depth;
    }
    if timeout_secs.is_some() {
        layered.timeout_secs = timeout_secs;
    }
    AnalysisOptions::from_config(&layered)
}

fn spinner(message: String) -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

/// Cancel `token` on Ctrl-C so child processes and temporary clones are cleaned up.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            token.cancel();
        }
    });
}

async fn run_analyze(
    location: &str,
    options: &AnalysisOptions,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let progress = spinner(format!("Analyzing {location}..."));
    let result = churnrate_engine::analyze(location, options, cancel).await;
    if let Some(pb) = progress {
        match &result {
            Ok(_) => pb.finish_and_clear(),
            Err(_) => pb.finish_with_message("Failed"),
        }
    }
    let result = result?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).into_diagnostic()?
            );
        }
        OutputFormat::Markdown => print!("{}", report::repo_markdown(location, &result, 1)),
        OutputFormat::Text => println!("\n{}", report::repo_text(location, &result)),
    }
    Ok(())
}

async fn run_org(
    org_name: &str,
    config: &ChurnConfig,
    options: &AnalysisOptions,
    limit: usize,
    include_forks: bool,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = GitHubClient::new(resolve_token(config.org.token.as_deref()))?;

    let listing = spinner(format!("Listing repositories of {org_name}..."));
    let repos = tokio::select! {
        () = cancel.cancelled() => Err(ChurnError::Cancelled),
        repos = client.list_org_repos(org_name) => repos,
    };
    if let Some(pb) = listing {
        pb.finish_and_clear();
    }
    let repos = repos?;
    if repos.is_empty() {
        return Err(ChurnError::GitHub(format!(
            "no repositories found for organization: {org_name}"
        ))
        .into());
    }

    let targets = select_targets(repos, limit, include_forks);
    if targets.is_empty() {
        miette::bail!(
            "no repositories of {org_name} left to analyze; forks are skipped unless --include-forks is given"
        );
    }
    eprintln!(
        "Analyzing the {} most recently pushed repositories of {org_name}",
        targets.len()
    );

    let progress = spinner(String::new());
    let org_report: OrgReport = org::analyze_targets(
        org_name,
        &targets,
        options,
        Utc::now(),
        cancel,
        |event| match event {
            OrgProgress::Started { index, total, repo } => {
                let line = format!("[{index}/{total}] {}", repo.name);
                match &progress {
                    Some(pb) => pb.set_message(line),
                    None => eprintln!("{line}"),
                }
            }
            OrgProgress::Finished(done) => {
                if format == OutputFormat::Text {
                    let text = report::repo_text(&done.name, &done.result);
                    match &progress {
                        Some(pb) => pb.suspend(|| println!("\n{text}")),
                        None => println!("\n{text}"),
                    }
                }
            }
            OrgProgress::Failed(failure) => {
                let line = format!("Warning: failed to analyze {}: {}", failure.name, failure.error);
                match &progress {
                    Some(pb) => pb.println(line),
                    None => eprintln!("{line}"),
                }
            }
        },
    )
    .await
    .inspect_err(|_e| {
        if let Some(pb) = &progress {
            pb.finish_with_message("Cancelled");
        }
    })?;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&org_report).into_diagnostic()?
            );
        }
        OutputFormat::Markdown => print!("{}", report::org_markdown(&org_report)),
        OutputFormat::Text => println!("\n{}", report::org_text(&org_report)),
    }

    if org_report.summary.is_none() {
        miette::bail!("no repository of {org_name} could be analyzed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let forced_color = match cli.color {
        ColorChoice::Always => Some(true),
        ColorChoice::Never => Some(false),
        ColorChoice::Auto => None,
    };
    miette::set_hook(Box::new(move |_| {
        let opts = miette::MietteHandlerOpts::new().terminal_links(true);
        let opts = match forced_color {
            Some(color) => opts.color(color),
            None => opts,
        };
        Box::new(opts.build())
    }))
    .into_diagnostic()?;

    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    debug!(
        format = %cli.format,
        days = config.analysis.days,
        depth_per_day = config.analysis.depth_per_day,
        org_limit = config.org.limit,
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Analyze {
            ref location,
            days,
        }) => {
            let options =
                analysis_options(&config.analysis, days, cli.depth_per_day, cli.timeout)?;
            run_analyze(location, &options, cli.format, &cancel).await?;
        }
        Some(Command::Org {
            ref org,
            days,
            limit,
            include_forks,
        }) => {
            let options =
                analysis_options(&config.analysis, days, cli.depth_per_day, cli.timeout)?;
            let limit = limit.unwrap_or(config.org.limit);
            let include_forks = include_forks || config.org.include_forks;
            run_org(
                org,
                &config,
                &options,
                limit,
                include_forks,
                cli.format,
                &cancel,
            )
            .await?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "git-churnrate", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_template_parses() {
        let config = ChurnConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.analysis.days, 28);
        assert_eq!(config.org.limit, 10);
        assert!(config.org.token.is_none());
    }

    #[test]
    fn flags_override_config() {
        let config = AnalysisConfig {
            days: 90,
            depth_per_day: 10,
            timeout_secs: Some(30),
        };
        let opts = analysis_options(&config, Some(14), None, Some(5)).unwrap();
        assert_eq!(opts.window_days.get(), 14);
        assert_eq!(opts.depth_per_day.get(), 10);
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn config_used_without_flags() {
        let config = AnalysisConfig {
            days: 90,
            depth_per_day: 10,
            timeout_secs: None,
        };
        let opts = analysis_options(&config, None, None, None).unwrap();
        assert_eq!(opts.git_depth(), 900);
        assert!(opts.timeout.is_none());
    }

    #[test]
    fn analyze_defaults_to_current_directory() {
        let cli = Cli::try_parse_from(["git-churnrate", "analyze"]).unwrap();
        match cli.command {
            Some(Command::Analyze { location, days }) => {
                assert_eq!(location, ".");
                assert!(days.is_none());
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn zero_days_rejected() {
        assert!(Cli::try_parse_from(["git-churnrate", "analyze", "--days", "0"]).is_err());
    }

    #[test]
    fn org_flags_parse() {
        let cli = Cli::try_parse_from([
            "git-churnrate",
            "org",
            "acme",
            "--limit",
            "3",
            "--include-forks",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Some(Command::Org {
                org,
                limit,
                include_forks,
                ..
            }) => {
                assert_eq!(org, "acme");
                assert_eq!(limit, Some(3));
                assert!(include_forks);
            }
            _ => panic!("expected org"),
        }
    }
}
