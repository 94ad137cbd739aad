//! orghours - organization coding hours CLI
//!
//! The `orghours` command merges `git-hours` reports and republishes them.
//!
//! ## Commands
//!
//! - `collect`: Run `git-hours` on one or more repositories and write reports
//! - `aggregate`: Merge existing reports into one aggregated report
//! - `readme`: Refresh the contributor-hours table inside a Markdown document
//! - `site`: Build the static KPI page
//!
//! Exit codes: 0 success, 1 other failure, 2 no usable report, 3 marker not
//! found, 4 IO failure, 5 partial result under `--strict`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};

use orghours_core::{
    aggregate_file_name, assemble, collect_all, inject_file, latest_report, load_sources, merge,
    markdown_table, render, render_html, reports_for_date, write_json, write_run_artifacts,
    AggregateReport, AliasRuleSet, GitHoursCollector, HoursConfig, HoursError, InjectWarning,
    LoadOutcome, MarkdownOptions, PipelineSpan, RepoTarget, Resolution, SortKey, LATEST_DATA_FILE,
};

#[derive(Parser)]
#[command(name = "orghours")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Organization-wide coding hours from git-hours reports", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct AliasArgs {
    /// YAML alias map (alias: canonical); takes priority over the mailmap
    #[arg(long, env = "ORGHOURS_ALIASES")]
    aliases: Option<PathBuf>,

    /// Git mailmap file
    #[arg(long, env = "ORGHOURS_MAILMAP")]
    mailmap: Option<PathBuf>,

    /// Follow alias chains up to this many hops instead of a single lookup
    #[arg(long, value_name = "MAX_HOPS")]
    follow_chains: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Hours,
    Commits,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Hours => SortKey::Hours,
            SortArg::Commits => SortKey::Commits,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run git-hours on repositories and write per-repo and aggregated reports
    Collect {
        /// Repository slug (owner/name); repeatable. Defaults to the current checkout
        #[arg(long = "repo", env = "REPOS", value_delimiter = ' ')]
        repos: Vec<String>,

        /// Local checkout to measure instead of cloning
        #[arg(long)]
        path: Option<PathBuf>,

        /// Only count commits since this date (passed to git-hours -since)
        #[arg(long, env = "WINDOW_START")]
        since: Option<String>,

        /// Output directory for report files
        #[arg(short, long, default_value = "reports")]
        out: PathBuf,

        #[command(flatten)]
        alias: AliasArgs,

        /// Exit non-zero when any repository failed
        #[arg(long)]
        strict: bool,
    },

    /// Merge report files into one aggregated report
    Aggregate {
        /// Report files (git-hours JSON)
        #[arg(required = true)]
        reports: Vec<PathBuf>,

        /// Output directory for the aggregated report
        #[arg(short, long, default_value = "reports")]
        out: PathBuf,

        #[command(flatten)]
        alias: AliasArgs,

        /// Exit non-zero when any report was rejected
        #[arg(long)]
        strict: bool,
    },

    /// Refresh the contributor table between markers in a Markdown document
    Readme {
        /// Report files; the latest report under reports/ or site/data/ when omitted
        reports: Vec<PathBuf>,

        /// Document to update
        #[arg(short, long, default_value = "README.md")]
        document: PathBuf,

        /// Start marker line
        #[arg(long, env = "ORGHOURS_START_MARKER")]
        start: Option<String>,

        /// End marker line
        #[arg(long, env = "ORGHOURS_END_MARKER")]
        end: Option<String>,

        /// Include a commits column
        #[arg(long)]
        commits: bool,

        /// Sort rows by this metric (descending)
        #[arg(long, value_enum, default_value = "hours")]
        sort: SortArg,

        #[command(flatten)]
        alias: AliasArgs,

        /// Exit non-zero when any report was rejected
        #[arg(long)]
        strict: bool,
    },

    /// Build the static KPI page
    Site {
        /// Per-repository report files; defaults to the given date's reports
        reports: Vec<PathBuf>,

        /// Directory searched for reports when none are given
        #[arg(long, default_value = "reports")]
        reports_dir: PathBuf,

        /// Report date (YYYY-MM-DD), defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output directory for the site
        #[arg(short, long, default_value = "site")]
        out: PathBuf,

        /// Sort rows by this metric (descending)
        #[arg(long, value_enum, default_value = "hours")]
        sort: SortArg,

        #[command(flatten)]
        alias: AliasArgs,

        /// Exit non-zero when any report was rejected
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    orghours_core::init_tracing(cli.json, level);

    if let Err(err) = run(cli.command).await {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

/// Exit code of the first [`HoursError`] in the chain, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<HoursError>())
        .map(HoursError::exit_code)
        .unwrap_or(1)
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Collect {
            repos,
            path,
            since,
            out,
            alias,
            strict,
        } => cmd_collect(repos, path, since, &out, &alias, strict).await,
        Commands::Aggregate {
            reports,
            out,
            alias,
            strict,
        } => cmd_aggregate(&reports, &out, &alias, strict),
        Commands::Readme {
            reports,
            document,
            start,
            end,
            commits,
            sort,
            alias,
            strict,
        } => cmd_readme(
            reports,
            &document,
            start.as_deref(),
            end.as_deref(),
            commits,
            sort.into(),
            &alias,
            strict,
        ),
        Commands::Site {
            reports,
            reports_dir,
            date,
            out,
            sort,
            alias,
            strict,
        } => cmd_site(reports, &reports_dir, date, &out, sort.into(), &alias, strict),
    }
}

fn config_for(alias: &AliasArgs) -> HoursConfig {
    let mut config = HoursConfig::from_env();
    if let Some(path) = &alias.aliases {
        config = config.with_aliases(path);
    }
    if let Some(path) = &alias.mailmap {
        config = config.with_mailmap(path);
    }
    config
}

fn load_rules(config: &HoursConfig, alias: &AliasArgs) -> Result<AliasRuleSet> {
    let rules = config.load_aliases().context("Failed to load alias rules")?;
    info!(rules = rules.len(), "alias rules loaded");
    Ok(match alias.follow_chains {
        Some(max_hops) => rules.with_resolution(Resolution::FixedPoint { max_hops }),
        None => rules,
    })
}

fn merge_outcome(outcome: &LoadOutcome, rules: &AliasRuleSet) -> Result<AggregateReport> {
    let aggregate = merge(&outcome.reports, rules).context("Failed to merge reports")?;
    let total = aggregate.total();
    orghours_core::emit_aggregate_merged(
        outcome.reports.len(),
        aggregate.contributor_count(),
        total.hours,
        total.commits,
    );
    Ok(aggregate)
}

/// Report rejected sources before anything is written. Under `strict` a
/// partial run stops here, so no partial output reaches disk.
fn check_partial(outcome: &LoadOutcome, strict: bool) -> Result<()> {
    if !outcome.is_partial() {
        return Ok(());
    }
    for failure in &outcome.failures {
        eprintln!("warning: skipped {}: {}", failure.source, failure.reason);
    }
    if strict {
        outcome.require_complete()?;
    }
    eprintln!(
        "warning: totals are partial ({} of {} sources used)",
        outcome.reports.len(),
        outcome.attempted()
    );
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Run git-hours and write per-source plus aggregated reports
async fn cmd_collect(
    repos: Vec<String>,
    path: Option<PathBuf>,
    since: Option<String>,
    out: &Path,
    alias: &AliasArgs,
    strict: bool,
) -> Result<()> {
    let _span = PipelineSpan::enter("collect");
    let config = config_for(alias).with_window_start(since);
    let rules = load_rules(&config, alias)?;

    let mut targets: Vec<RepoTarget> = repos
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .map(RepoTarget::Remote)
        .collect();
    if let Some(path) = path {
        targets.push(RepoTarget::Local(path));
    }
    if targets.is_empty() {
        targets.push(RepoTarget::Local(PathBuf::from(".")));
    }

    let collector = Arc::new(GitHoursCollector::new().with_since(config.window_start.clone()));
    let mut outcome = LoadOutcome::default();
    for (name, result) in collect_all(collector, &targets).await {
        info!("Processed {}", name);
        match result {
            Ok(report) => outcome.push_report(report),
            Err(e) => outcome.push_failure(&name, None, &e),
        }
    }
    outcome.require_any(&[])?;
    check_partial(&outcome, strict)?;

    let aggregate = merge_outcome(&outcome, &rules)?;
    let written = write_run_artifacts(out, today(), &outcome.reports, &aggregate)
        .context("Failed to write reports")?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&aggregate)?);

    Ok(())
}

/// Merge report files into one aggregated report
fn cmd_aggregate(reports: &[PathBuf], out: &Path, alias: &AliasArgs, strict: bool) -> Result<()> {
    let _span = PipelineSpan::enter("aggregate");
    let config = config_for(alias);
    let rules = load_rules(&config, alias)?;

    let outcome = load_sources(reports);
    outcome.require_any(reports)?;
    check_partial(&outcome, strict)?;
    let aggregate = merge_outcome(&outcome, &rules)?;

    let path = out.join(aggregate_file_name(today()));
    write_json(&path, &aggregate).context("Failed to write aggregated report")?;
    eprintln!("Wrote {}", path.display());
    println!("{}", serde_json::to_string_pretty(&aggregate)?);

    Ok(())
}

/// Refresh the contributor-hours table in a Markdown document
#[allow(clippy::too_many_arguments)]
fn cmd_readme(
    reports: Vec<PathBuf>,
    document: &Path,
    start: Option<&str>,
    end: Option<&str>,
    commits: bool,
    sort: SortKey,
    alias: &AliasArgs,
    strict: bool,
) -> Result<()> {
    let _span = PipelineSpan::enter("readme");
    let mut config = config_for(alias);
    if start.is_some() || end.is_some() {
        let start = start.unwrap_or(&config.start_marker).to_string();
        let end = end.unwrap_or(&config.end_marker).to_string();
        config = config.with_markers(&start, &end);
    }
    let rules = load_rules(&config, alias)?;

    let reports = if reports.is_empty() {
        vec![latest_report(&config.report_dirs)?]
    } else {
        reports
    };
    for path in &reports {
        info!(report = %path.display(), "using report");
    }

    let outcome = load_sources(&reports);
    outcome.require_any(&reports)?;
    check_partial(&outcome, strict)?;
    let aggregate = merge_outcome(&outcome, &rules)?;

    let rows = render(&aggregate, sort);
    let table = markdown_table(&rows, MarkdownOptions { commits });
    let injection = inject_file(document, &config.start_marker, &config.end_marker, &table)?;

    for warning in &injection.warnings {
        match warning {
            InjectWarning::EndMarkerMissing { marker } => warn!(
                document = %document.display(),
                "end marker {marker:?} missing; replaced through end of document"
            ),
        }
    }
    if injection.changed {
        println!("Updated {} ({} contributors)", document.display(), rows.len());
    } else {
        println!("{} already up to date", document.display());
    }

    Ok(())
}

/// Build the static KPI page
fn cmd_site(
    reports: Vec<PathBuf>,
    reports_dir: &Path,
    date: Option<NaiveDate>,
    out: &Path,
    sort: SortKey,
    alias: &AliasArgs,
    strict: bool,
) -> Result<()> {
    let _span = PipelineSpan::enter("site");
    let config = config_for(alias);
    let rules = load_rules(&config, alias)?;
    let date = date.unwrap_or_else(today);

    let reports = if reports.is_empty() {
        reports_for_date(reports_dir, date)?
    } else {
        reports
    };
    let outcome = load_sources(&reports);
    outcome.require_any(&[reports_dir.to_path_buf()])?;
    check_partial(&outcome, strict)?;
    let aggregate = merge_outcome(&outcome, &rules)?;

    let page = assemble(
        &aggregate,
        &outcome.reports,
        &outcome.failures,
        &rules,
        sort,
        Utc::now(),
    )?;

    let index = out.join("index.html");
    std::fs::create_dir_all(out)
        .map_err(|e| HoursError::io(out, e))
        .context("Failed to create site directory")?;
    std::fs::write(&index, render_html(&page))
        .map_err(|e| HoursError::io(&index, e))
        .context("Failed to write site page")?;
    write_json(
        &out.join("data").join(format!("git-hours-{}.json", date.format("%Y-%m-%d"))),
        &aggregate,
    )?;
    write_json(&out.join(LATEST_DATA_FILE), &aggregate)?;

    println!(
        "Wrote {} ({} repositories, {} contributors)",
        index.display(),
        page.totals.repositories,
        page.totals.contributors
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_readme_defaults() {
        let cli = Cli::try_parse_from(["orghours", "readme"]).unwrap();
        match cli.command {
            Commands::Readme {
                reports,
                document,
                commits,
                ..
            } => {
                assert!(reports.is_empty());
                assert_eq!(document, PathBuf::from("README.md"));
                assert!(!commits);
            }
            _ => panic!("expected readme command"),
        }
    }

    #[test]
    fn aggregate_requires_reports() {
        assert!(Cli::try_parse_from(["orghours", "aggregate"]).is_err());
    }

    #[test]
    fn exit_code_follows_hours_error_in_chain() {
        let err = anyhow::Error::new(HoursError::MarkerNotFound {
            marker: "<!-- HOURS_START -->".to_string(),
        })
        .context("Failed to update README");
        assert_eq!(exit_code(&err), 3);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn readme_command_updates_document_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("git-hours-org_api-2024-01-01.json");
        std::fs::write(
            &report,
            r#"{"total": {"hours": 5, "commits": 2},
                "a@x.com": {"hours": 2, "commits": 1},
                "b@x.com": {"hours": 3, "commits": 1}}"#,
        )
        .unwrap();
        let aliases = dir.path().join("email-aliases.yaml");
        std::fs::write(&aliases, "b@x.com: a@x.com\n").unwrap();
        let readme = dir.path().join("README.md");
        std::fs::write(
            &readme,
            "# Title\n<!-- HOURS_START -->\nold\n<!-- HOURS_END -->\nfooter\n",
        )
        .unwrap();

        let alias = AliasArgs {
            aliases: Some(aliases),
            mailmap: Some(dir.path().join(".mailmap")),
            follow_chains: None,
        };
        cmd_readme(
            vec![report],
            &readme,
            Some("<!-- HOURS_START -->"),
            Some("<!-- HOURS_END -->"),
            false,
            SortKey::Hours,
            &alias,
            true,
        )
        .unwrap();

        let updated = std::fs::read_to_string(&readme).unwrap();
        assert_eq!(
            updated,
            "# Title\n<!-- HOURS_START -->\n\n| Contributor | Hours |\n|-------------|-------|\n| a@x.com | 5.0 |\n\n<!-- HOURS_END -->\nfooter\n"
        );
    }

    #[test]
    fn strict_readme_run_leaves_document_untouched_on_partial_input() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("git-hours-org_api-2024-01-01.json");
        let bad = dir.path().join("git-hours-org_web-2024-01-01.json");
        std::fs::write(&good, r#"{"a@x.com": {"hours": 2, "commits": 1}}"#).unwrap();
        std::fs::write(&bad, r#"{"a@x.com": {"hours": -2, "commits": 1}}"#).unwrap();
        let readme = dir.path().join("README.md");
        let original = "# Title\n<!-- HOURS_START -->\nold\n<!-- HOURS_END -->\n";
        std::fs::write(&readme, original).unwrap();

        let alias = AliasArgs {
            aliases: Some(dir.path().join("email-aliases.yaml")),
            mailmap: Some(dir.path().join(".mailmap")),
            follow_chains: None,
        };
        let err = cmd_readme(
            vec![good, bad],
            &readme,
            Some("<!-- HOURS_START -->"),
            Some("<!-- HOURS_END -->"),
            false,
            SortKey::Hours,
            &alias,
            true,
        )
        .unwrap_err();

        assert_eq!(exit_code(&err), 5);
        assert_eq!(std::fs::read_to_string(&readme).unwrap(), original);
    }

    #[test]
    fn strict_aggregate_run_writes_nothing_on_partial_input() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("git-hours-org_api-2024-01-01.json");
        let bad = dir.path().join("git-hours-org_web-2024-01-01.json");
        std::fs::write(&good, r#"{"a@x.com": {"hours": 2, "commits": 1}}"#).unwrap();
        std::fs::write(&bad, "{broken").unwrap();
        let out = dir.path().join("out");

        let alias = AliasArgs {
            aliases: Some(dir.path().join("email-aliases.yaml")),
            mailmap: Some(dir.path().join(".mailmap")),
            follow_chains: None,
        };
        let err = cmd_aggregate(&[good, bad], &out, &alias, true).unwrap_err();
        assert_eq!(exit_code(&err), 5);
        assert!(!out.exists());
    }
}
