//! Matching Orchestrator.
//!
//! Wires the pure components together into the `check` pipeline:
//! branding filter, size floors, triviality check, fingerprinting,
//! per-database Layer-1 search, optional Layer-2 confirmation, and
//! [`Finding`] emission.

use crate::candidate::layer1_find_candidates;
use crate::config::{ProvenanceConfig, Thresholds};
use crate::db::{CommitRecord, DbRecord, FingerprintDb, PrRecord};
use crate::deep_compare::deep_compare_diffs;
use crate::fingerprint::build_fingerprint;
use crate::host::ProvenanceHost;
use crate::normalize::split_diff_by_file;
use crate::sink::Sink;
use crate::triviality::{count_diff_lines, detect_code_movement, filter_branding_changes};
use crate::types::{Finding, FindingKind, MatchMethod};
use chrono::{DateTime, Utc};

/// Extract every `Date: <RFC 2822>` header from a diff (patch e-mail
/// headers carried along by `git format-patch`-style diffs) and return
/// the earliest one, normalized to UTC with a `Z` suffix.
pub fn get_earliest_commit_date(diff_text: &str) -> Option<String> {
    let mut earliest: Option<DateTime<Utc>> = None;
    for line in diff_text.split('\n') {
        let Some(rest) = line.strip_prefix("Date: ") else {
            continue;
        };
        let Ok(parsed) = DateTime::parse_from_rfc2822(rest.trim()) else {
            continue;
        };
        let utc = parsed.with_timezone(&Utc);
        earliest = Some(match earliest {
            Some(current) if current <= utc => current,
            _ => utc,
        });
    }
    earliest.map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn earlier(a: &str, b: &str) -> String {
    if a <= b {
        a.to_owned()
    } else {
        b.to_owned()
    }
}

/// Outcome of [`check_diff`]: whether anything matched, plus the
/// ordered findings (PRs first, then commits; each group ranked by
/// Layer-1 similarity descending).
#[derive(Debug)]
pub struct CheckOutcome {
    pub matched: bool,
    pub findings: Vec<Finding>,
}

/// Run the full `check` pipeline against raw diff bytes. `host` is used
/// only for Layer-2 confirmation fetches; pass `None` to stay
/// Layer-1-only (degraded mode).
#[allow(clippy::too_many_arguments)]
pub fn check_diff(
    diff_text: &str,
    pr_db: &FingerprintDb,
    commit_db: &FingerprintDb,
    config: &ProvenanceConfig,
    thresholds: &Thresholds,
    max_report: usize,
    pr_date: Option<&str>,
    ignore_date: bool,
    host: Option<(&dyn ProvenanceHost, &str, &str)>,
    sink: &dyn Sink,
) -> crate::error::Result<CheckOutcome> {
    if diff_text.trim().is_empty() {
        return Ok(CheckOutcome { matched: false, findings: Vec::new() });
    }

    let filtered = filter_branding_changes(diff_text, config);

    let earliest_date = get_earliest_commit_date(&filtered);
    let effective_date = match (&earliest_date, pr_date) {
        (Some(earliest), Some(pr_date)) => Some(earlier(earliest, pr_date)),
        (Some(earliest), None) => Some(earliest.clone()),
        (None, Some(pr_date)) => Some(pr_date.to_owned()),
        (None, None) => None,
    };

    let norm_all = crate::normalize::normalize_diff(&filtered, config, None);
    if norm_all.split_whitespace().count() < thresholds.min_tokens {
        return Ok(CheckOutcome { matched: false, findings: Vec::new() });
    }

    let diff_files = split_diff_by_file(&filtered);
    let total_lines: usize = diff_files.values().map(count_diff_lines).sum();
    if total_lines < thresholds.min_lines {
        return Ok(CheckOutcome { matched: false, findings: Vec::new() });
    }

    let movement = detect_code_movement(&filtered, thresholds.min_net_new_lines, thresholds.code_movement_threshold);
    if movement.is_trivial {
        sink.debug(&format!(
            "skipping trivial diff (movement_ratio={:.2}, net_new={})",
            movement.movement_ratio, movement.net_new_lines
        ));
        return Ok(CheckOutcome { matched: false, findings: Vec::new() });
    }

    let fingerprint = build_fingerprint(&filtered, &diff_files, config);

    let mut findings = Vec::new();

    let pr_candidates = layer1_find_candidates(
        &fingerprint,
        &pr_db.prs,
        config,
        thresholds,
        effective_date.as_deref(),
        ignore_date,
    )?;
    findings.extend(confirm_matches(
        pr_candidates,
        FindingKind::Pr,
        &diff_files,
        config,
        thresholds,
        max_report,
        host,
        |record: &PrRecord| record.number.to_string(),
        sink,
    ));

    let commit_candidates = layer1_find_candidates(
        &fingerprint,
        &commit_db.commits,
        config,
        thresholds,
        effective_date.as_deref(),
        ignore_date,
    )?;
    findings.extend(confirm_matches(
        commit_candidates,
        FindingKind::Commit,
        &diff_files,
        config,
        thresholds,
        max_report,
        host,
        |record: &CommitRecord| record.sha.clone(),
        sink,
    ));

    Ok(CheckOutcome { matched: !findings.is_empty(), findings })
}

#[allow(clippy::too_many_arguments)]
fn confirm_matches<R: DbRecord + Clone>(
    candidates: Vec<crate::types::Candidate<R>>,
    kind: FindingKind,
    diff_files: &crate::types::FileDiffMap,
    config: &ProvenanceConfig,
    thresholds: &Thresholds,
    max_report: usize,
    host: Option<(&dyn ProvenanceHost, &str, &str)>,
    identifier_of: impl Fn(&R) -> String,
    sink: &dyn Sink,
) -> Vec<Finding> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let combined: String = diff_files.values().collect::<Vec<_>>().join("\n");
    let mut findings = Vec::new();

    for candidate in candidates.into_iter().take(max_report * 2) {
        let identifier = identifier_of(&candidate.entry);

        let (similarity, method) = match host {
            Some((host, owner, repo)) => {
                let source_diff = match kind {
                    FindingKind::Pr => identifier
                        .parse::<u64>()
                        .ok()
                        .and_then(|n| host.fetch_pr_diff(owner, repo, n).ok()),
                    FindingKind::Commit => host.fetch_commit_diff(owner, repo, &identifier).ok(),
                };

                match source_diff {
                    Some(source_diff) => {
                        let deep = deep_compare_diffs(&combined, &source_diff, config);
                        (deep.similarity, MatchMethod::SimhashPlusDeep)
                    }
                    None => {
                        sink.debug(&format!("layer 2 confirmation unavailable for {identifier}, falling back to layer 1"));
                        (candidate.sim, MatchMethod::Simhash)
                    }
                }
            }
            None => (candidate.sim, MatchMethod::Simhash),
        };

        if similarity < thresholds.layer2_similarity {
            continue;
        }

        findings.push(Finding { kind, identifier, similarity, method });
        if findings.len() >= max_report {
            break;
        }
    }
    findings
}
