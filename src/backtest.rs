//! Backtest.
//!
//! Runs the `check` pipeline over a range of PR numbers and tallies
//! outcomes, the way a maintainer would validate a threshold change
//! against PR history before rolling it out. Calls directly into
//! [`crate::orchestrate::check_diff`] in-process rather than shelling
//! out to a second `provenance-guard check` invocation per PR.

use crate::config::{ProvenanceConfig, Thresholds};
use crate::db::FingerprintDb;
use crate::host::ProvenanceHost;
use crate::orchestrate::check_diff;
use crate::sink::Sink;

/// Outcome of backtesting a single PR. `Timeout` is reserved
/// for a future per-PR deadline and is never produced today, since an
/// in-process call has no subprocess to time out.
#[derive(Debug, Clone, PartialEq)]
pub enum BacktestStatus {
    Pass,
    Fail(Vec<String>),
    Error(String),
    NotFound,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub pr_number: u64,
    pub status: BacktestStatus,
}

#[derive(Debug, Clone, Default)]
pub struct BacktestSummary {
    pub total: usize,
    pub flagged: usize,
    pub errors: usize,
}

/// Backtest PRs `start..=end` against `pr_db`/`commit_db`, logging
/// progress every 20 PRs.
#[allow(clippy::too_many_arguments)]
pub fn run_backtest(
    host: &dyn ProvenanceHost,
    owner: &str,
    repo: &str,
    start: u64,
    end: u64,
    pr_db: &FingerprintDb,
    commit_db: &FingerprintDb,
    config: &ProvenanceConfig,
    thresholds: &Thresholds,
    sink: &dyn Sink,
) -> (Vec<BacktestResult>, BacktestSummary) {
    let total = (end - start + 1) as usize;
    let mut results = Vec::with_capacity(total);
    let mut summary = BacktestSummary { total, flagged: 0, errors: 0 };

    for (i, pr_number) in (start..=end).enumerate() {
        let status = check_pr(host, owner, repo, pr_number, pr_db, commit_db, config, thresholds, sink);

        let progress_point = i == 0 || (i + 1) % 20 == 0 || i + 1 == total;
        if progress_point {
            sink.info(&format!(
                "progress: {}/{} ({}%)",
                i + 1,
                total,
                100 * (i + 1) / total
            ));
        }

        match &status {
            BacktestStatus::Fail(details) => {
                summary.flagged += 1;
                sink.info(&format!("flagged PR #{pr_number}: {}", details.join("; ")));
            }
            BacktestStatus::Error(detail) => {
                summary.errors += 1;
                sink.warn(&format!("error on PR #{pr_number}: {detail}"));
            }
            _ => {}
        }

        results.push(BacktestResult { pr_number, status });
    }

    (results, summary)
}

#[allow(clippy::too_many_arguments)]
fn check_pr(
    host: &dyn ProvenanceHost,
    owner: &str,
    repo: &str,
    pr_number: u64,
    pr_db: &FingerprintDb,
    commit_db: &FingerprintDb,
    config: &ProvenanceConfig,
    thresholds: &Thresholds,
    sink: &dyn Sink,
) -> BacktestStatus {
    let info = match host.fetch_pr_info(owner, repo, pr_number) {
        Ok(info) => info,
        Err(crate::host::HostError::NotFound(_)) => return BacktestStatus::NotFound,
        Err(e) => return BacktestStatus::Error(e.to_string()),
    };
    let diff_text = match host.fetch_pr_diff(owner, repo, pr_number) {
        Ok(diff) => diff,
        Err(crate::host::HostError::NotFound(_)) => return BacktestStatus::NotFound,
        Err(e) => return BacktestStatus::Error(e.to_string()),
    };

    let outcome = match check_diff(
        &diff_text,
        pr_db,
        commit_db,
        config,
        thresholds,
        5,
        Some(&info.created_at),
        false,
        Some((host, owner, repo)),
        sink,
    ) {
        Ok(outcome) => outcome,
        Err(e) => return BacktestStatus::Error(e.to_string()),
    };

    if outcome.matched {
        let details = outcome
            .findings
            .iter()
            .take(2)
            .map(|f| f.display_line(&config.source_repo))
            .collect();
        BacktestStatus::Fail(details)
    } else {
        BacktestStatus::Pass
    }
}
