//! CLI entry point for provenance-guard
//!
//! Wires the pure matching core to `GithubHost`, a stderr `Sink`, and
//! process exit codes across four subcommands: `check`, `refresh`,
//! `bootstrap`, `backtest`.

use clap::{Parser, Subcommand};
use provenance_guard::config::{ProvenanceConfig, Thresholds};
use provenance_guard::db::FingerprintDb;
use provenance_guard::host::GithubHost;
use provenance_guard::orchestrate::check_diff;
use provenance_guard::sink::{LogSink, Sink};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

#[derive(Parser)]
#[command(name = "provenance-guard")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand that builds a `ProvenanceConfig`:
/// branding/prefix pairs as comma-separated lists, plus single-pair
/// convenience flags folded into the same lists.
#[derive(clap::Args, Clone)]
struct ConfigArgs {
    /// `owner/name` of the provenance-source repository.
    #[arg(long)]
    source_repo: String,
    /// `owner/name` of the candidate-target repository.
    #[arg(long)]
    target_repo: String,
    /// `Source1:Target1,Source2:Target2` branding substitutions.
    #[arg(long, default_value = "")]
    branding_pairs: String,
    /// Single-pair convenience flag, folded into `--branding-pairs`.
    #[arg(long)]
    source_brand: Option<String>,
    #[arg(long)]
    target_brand: Option<String>,
    /// `Prefix1:Prefix2,...` identifier-prefix substitutions.
    #[arg(long, default_value = "")]
    prefix_pairs: String,
    #[arg(long)]
    source_prefix: Option<String>,
    #[arg(long)]
    target_prefix: Option<String>,
    /// Comma-separated substrings marking infrastructure file paths.
    #[arg(long, default_value = "")]
    infrastructure_patterns: String,
}

impl ConfigArgs {
    fn build(&self) -> anyhow::Result<ProvenanceConfig> {
        let mut branding_pairs = ProvenanceConfig::parse_pairs("branding-pairs", &self.branding_pairs)?;
        if let (Some(source), Some(target)) = (&self.source_brand, &self.target_brand) {
            branding_pairs.push((source.clone(), target.clone()));
        }
        let mut prefix_pairs = ProvenanceConfig::parse_pairs("prefix-pairs", &self.prefix_pairs)?;
        if let (Some(source), Some(target)) = (&self.source_prefix, &self.target_prefix) {
            prefix_pairs.push((source.clone(), target.clone()));
        }
        let infrastructure_patterns: Vec<String> = self
            .infrastructure_patterns
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(ProvenanceConfig::new(
            self.source_repo.clone(),
            self.target_repo.clone(),
            branding_pairs,
            prefix_pairs,
            infrastructure_patterns,
        )?)
    }
}

/// Threshold overrides shared by `check`/`backtest`.
#[derive(clap::Args, Clone)]
struct ThresholdArgs {
    #[arg(long)]
    layer1_simhash_base: Option<f64>,
    #[arg(long)]
    layer1_simhash_with_patchid: Option<f64>,
    #[arg(long)]
    layer2_similarity: Option<f64>,
    #[arg(long)]
    min_tokens: Option<usize>,
    #[arg(long)]
    min_lines: Option<usize>,
}

impl ThresholdArgs {
    fn build(&self) -> Thresholds {
        let mut thresholds = Thresholds::default();
        if let Some(v) = self.layer1_simhash_base {
            thresholds.layer1_simhash_base = v;
        }
        if let Some(v) = self.layer1_simhash_with_patchid {
            thresholds.layer1_simhash_with_patchid = v;
        }
        if let Some(v) = self.layer2_similarity {
            thresholds.layer2_similarity = v;
        }
        if let Some(v) = self.min_tokens {
            thresholds.min_tokens = v;
        }
        if let Some(v) = self.min_lines {
            thresholds.min_lines = v;
        }
        thresholds
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check a diff for provenance matches against the fingerprint databases.
    Check {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
        /// Read the diff from this file instead of stdin/`BASE_SHA..HEAD_SHA`.
        #[arg(long)]
        diff_file: Option<PathBuf>,
        #[arg(long)]
        pr_db: PathBuf,
        #[arg(long)]
        commit_db: PathBuf,
        /// RFC 3339 timestamp of the PR/commit under review, used as the
        /// date cutoff alongside any `Date:` headers in the diff itself.
        #[arg(long)]
        pr_date: Option<String>,
        /// Skip the date-cutoff filter entirely.
        #[arg(long, default_value_t = false)]
        ignore_date: bool,
        #[arg(long, default_value_t = 5)]
        max_report: usize,
        /// Skip Layer-2 confirmation fetches and report Layer-1 matches only.
        #[arg(long, default_value_t = false)]
        no_host: bool,
    },
    /// Refresh the PR fingerprint database from the source repository.
    Refresh {
        /// `owner/name` of the source repository to index.
        #[arg(long)]
        repo: String,
        #[arg(long)]
        cutoff_date: String,
        #[arg(long)]
        db: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Bootstrap the commit fingerprint database from a shallow clone.
    Bootstrap {
        #[arg(long)]
        source_url: String,
        /// `owner/name` recorded in the database.
        #[arg(long)]
        source_repo: String,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long)]
        cutoff_date: String,
        #[arg(long)]
        db: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Backtest the checker over a range of PR numbers.
    Backtest {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
        #[arg(long)]
        repo: String,
        #[arg(long)]
        start: u64,
        #[arg(long)]
        end: u64,
        #[arg(long)]
        pr_db: PathBuf,
        #[arg(long)]
        commit_db: PathBuf,
    },
}

/// Read the diff under test: an explicit `--diff-file`, else stdin,
/// else a local `git diff BASE_SHA..HEAD_SHA`.
fn read_diff(diff_file: &Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = diff_file {
        return Ok(std::fs::read_to_string(path)?);
    }
    if let (Ok(base), Ok(head)) = (std::env::var("BASE_SHA"), std::env::var("HEAD_SHA")) {
        let output = Command::new("git")
            .args(["diff", &format!("{base}..{head}")])
            .output()?;
        if !output.status.success() {
            anyhow::bail!("git diff {base}..{head} failed: {}", String::from_utf8_lossy(&output.stderr));
        }
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

/// Minimal level-prefixed stderr logger: this ecosystem
/// favors a small hand-rolled `log::Log` implementation over pulling in
/// `env_logger` for a CLI this size.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }
    fn log(&self, record: &log::Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }
    fn flush(&self) {}
}

fn install_logger() {
    static LOGGER: StderrLogger = StderrLogger;
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(log::LevelFilter::Info);
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(level));
}

fn github_token() -> Option<String> {
    std::env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty())
}

#[allow(clippy::too_many_arguments)]
fn run_check(
    config: ConfigArgs,
    thresholds: ThresholdArgs,
    diff_file: Option<PathBuf>,
    pr_db: PathBuf,
    commit_db: PathBuf,
    pr_date: Option<String>,
    ignore_date: bool,
    max_report: usize,
    no_host: bool,
    sink: &dyn Sink,
) -> anyhow::Result<bool> {
    let config = config.build()?;
    let thresholds = thresholds.build();
    let diff_text = read_diff(&diff_file)?;
    let pr_db_data = FingerprintDb::load(&pr_db);
    let commit_db_data = FingerprintDb::load(&commit_db);

    let (owner, repo) = config
        .target_repo
        .split_once('/')
        .ok_or_else(|| anyhow::anyhow!("--target-repo must be 'owner/name'"))?;
    let host = GithubHost::new(github_token(), sink);
    let host_ref: Option<(&dyn provenance_guard::host::ProvenanceHost, &str, &str)> =
        if no_host { None } else { Some((&host, owner, repo)) };

    let outcome = check_diff(
        &diff_text,
        &pr_db_data,
        &commit_db_data,
        &config,
        &thresholds,
        max_report,
        pr_date.as_deref(),
        ignore_date,
        host_ref,
        sink,
    )?;

    for finding in &outcome.findings {
        eprintln!("{}", finding.display_line(&config.source_repo));
    }
    Ok(outcome.matched)
}

fn main() -> ExitCode {
    install_logger();
    let cli = Cli::parse();
    let sink = LogSink;

    let result = match cli.command {
        Commands::Check {
            config,
            thresholds,
            diff_file,
            pr_db,
            commit_db,
            pr_date,
            ignore_date,
            max_report,
            no_host,
        } => run_check(
            config, thresholds, diff_file, pr_db, commit_db, pr_date, ignore_date, max_report, no_host, &sink,
        ),
        Commands::Refresh { repo, cutoff_date, db, config } => (|| {
            let config = config.build()?;
            let (owner, name) = repo
                .split_once('/')
                .ok_or_else(|| anyhow::anyhow!("--repo must be 'owner/name'"))?;
            let host = GithubHost::new(github_token(), &sink);
            provenance_guard::refresh::refresh_prs(&host, owner, name, &cutoff_date, &db, &config, &sink)?;
            Ok(false)
        })(),
        Commands::Bootstrap { source_url, source_repo, branch, cutoff_date, db, config } => (|| {
            let config = config.build()?;
            provenance_guard::bootstrap::bootstrap_commits(
                &source_url, &source_repo, &branch, &cutoff_date, &db, &config, &sink,
            )?;
            Ok(false)
        })(),
        Commands::Backtest { config, thresholds, repo, start, end, pr_db, commit_db } => (|| {
            let config = config.build()?;
            let thresholds = thresholds.build();
            let (owner, name) = repo
                .split_once('/')
                .ok_or_else(|| anyhow::anyhow!("--repo must be 'owner/name'"))?;
            let host = GithubHost::new(github_token(), &sink);
            let pr_db_data = FingerprintDb::load(&pr_db);
            let commit_db_data = FingerprintDb::load(&commit_db);
            let (_, summary) = provenance_guard::backtest::run_backtest(
                &host, owner, name, start, end, &pr_db_data, &commit_db_data, &config, &thresholds, &sink,
            );
            eprintln!(
                "backtest: {} total, {} flagged, {} errors",
                summary.total, summary.flagged, summary.errors
            );
            Ok(summary.flagged > 0)
        })(),
    };

    match result {
        Ok(matched) => {
            if matched {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            sink.error(&e.to_string());
            ExitCode::from(1)
        }
    }
}
