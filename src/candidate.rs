//! Layer-1 Candidate Search.
//!
//! Scans a fingerprint database for entries whose SimHash is close
//! enough to the query fingerprint to be worth a Layer-2 deep compare.

use crate::config::{ProvenanceConfig, Thresholds};
use crate::db::{normalize_timestamp, normalize_timestamp_strict, DbRecord};
use crate::error::Result;
use crate::fingerprint::compute_simhash_similarity;
use crate::types::{Candidate, Fingerprint};
use std::collections::BTreeMap;

/// Find and rank Layer-1 candidates for `fingerprint` against `entries`.
/// `target_date`, when `Some` and `ignore_date` is false, excludes any
/// entry created after it (PRs/commits from the future relative to the
/// change under test cannot be its source). A `target_date` that does
/// not parse as a timestamp is a fatal error, not a silently-ignored
/// filter: it is caller-supplied (the `--pr-date` CLI flag), unlike
/// the database timestamps normalized below.
pub fn layer1_find_candidates<R: DbRecord + Clone>(
    fingerprint: &Fingerprint,
    entries: &BTreeMap<String, R>,
    config: &ProvenanceConfig,
    thresholds: &Thresholds,
    target_date: Option<&str>,
    ignore_date: bool,
) -> Result<Vec<Candidate<R>>> {
    // An empty `files` map (no files at all, or every file an
    // infrastructure path) yields no candidates, even though the
    // whole-diff SimHash might still match.
    let any_non_infrastructure = fingerprint
        .files
        .keys()
        .any(|f| !is_infrastructure_file(f, config));
    if !any_non_infrastructure {
        return Ok(Vec::new());
    }

    let target_ts = if ignore_date {
        None
    } else {
        match target_date {
            Some(date) => normalize_timestamp_strict(date)?,
            None => None,
        }
    };

    let mut candidates = Vec::new();
    for (key, entry) in entries {
        if let Some(target_ts) = &target_ts {
            if let Some(entry_ts) = normalize_timestamp(entry.timestamp()) {
                if entry_ts.as_str() > target_ts.as_str() {
                    continue;
                }
            }
        }

        let api_id_match = match (&fingerprint.patch_id, entry.patch_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };

        if entry.files().is_empty() {
            let sim = compute_simhash_similarity(fingerprint.simhash64, entry.simhash64());
            let admitted = sim >= thresholds.layer1_simhash_base
                || (sim >= thresholds.layer1_simhash_with_patchid && api_id_match);
            if admitted {
                candidates.push(Candidate {
                    key: key.clone(),
                    entry: entry.clone(),
                    sim,
                    patch_id_match: api_id_match,
                    matched_files: Vec::new(),
                });
            }
            continue;
        }

        let mut best_sim = 0.0_f64;
        let mut matched_files = Vec::new();
        let mut any_patch_id_match = api_id_match;

        for (path, file_fp) in &fingerprint.files {
            if let Some(ref_fp) = entry.files().get(path) {
                let s = compute_simhash_similarity(file_fp.simhash64, ref_fp.simhash64);
                let fp_id_match = match (&file_fp.patch_id, &ref_fp.patch_id) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                };
                let admitted = s >= thresholds.layer1_simhash_base
                    || (s >= thresholds.layer1_simhash_with_patchid && fp_id_match);
                if admitted {
                    matched_files.push((path.clone(), s, fp_id_match));
                    best_sim = best_sim.max(s);
                    any_patch_id_match |= fp_id_match;
                }
            }
        }

        let overall_sim = compute_simhash_similarity(fingerprint.simhash64, entry.simhash64());
        best_sim = best_sim.max(overall_sim);

        let admitted = best_sim >= thresholds.layer1_simhash_base
            || (best_sim >= thresholds.layer1_simhash_with_patchid && any_patch_id_match)
            || !matched_files.is_empty();
        if admitted {
            candidates.push(Candidate {
                key: key.clone(),
                entry: entry.clone(),
                sim: best_sim,
                patch_id_match: any_patch_id_match,
                matched_files,
            });
        }
    }

    candidates.sort_by(|a, b| b.sim.partial_cmp(&a.sim).unwrap_or(std::cmp::Ordering::Equal));
    Ok(candidates)
}

/// Whether a file path names infrastructure (vendored code, build
/// files, docs) excluded from the provenance check.
pub fn is_infrastructure_file(filename: &str, config: &ProvenanceConfig) -> bool {
    config
        .infrastructure_patterns
        .iter()
        .any(|pattern| filename.contains(pattern.as_str()))
}
