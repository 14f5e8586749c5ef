//! Deep Comparator (Layer 2).
//!
//! Token-level comparison used to confirm or reject a Layer-1 candidate.

use crate::config::ProvenanceConfig;
use crate::normalize::normalize_diff;
use std::collections::HashSet;

/// Outcome of a deep comparison: the blended similarity plus the raw
/// intersection/union sizes the orchestrator may want to log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeepCompareResult {
    pub similarity: f64,
    pub intersection_len: usize,
    pub union_len: usize,
}

/// Compare two diffs token-for-token. Blends set-overlap
/// (Jaccard), position-aligned sequence similarity, and asymmetric
/// subset containment, taking the max of the weighted blend and the
/// subset ratio so that a wholesale copy embedded in a larger diff still
/// scores highly.
pub fn deep_compare_diffs(
    target_diff: &str,
    source_diff: &str,
    config: &ProvenanceConfig,
) -> DeepCompareResult {
    let target_normalized = normalize_diff(target_diff, config, None);
    let source_normalized = normalize_diff(source_diff, config, None);
    let target_tokens: Vec<&str> = target_normalized.split_whitespace().collect();
    let source_tokens: Vec<&str> = source_normalized.split_whitespace().collect();

    if target_tokens.is_empty() || source_tokens.is_empty() {
        return DeepCompareResult {
            similarity: 0.0,
            intersection_len: 0,
            union_len: target_tokens.len().max(source_tokens.len()),
        };
    }

    let target_set: HashSet<&str> = target_tokens.iter().copied().collect();
    let source_set: HashSet<&str> = source_tokens.iter().copied().collect();
    let intersection = target_set.intersection(&source_set).count();
    let union = target_set.union(&source_set).count();
    if union == 0 {
        return DeepCompareResult {
            similarity: 0.0,
            intersection_len: 0,
            union_len: 0,
        };
    }

    let jaccard = intersection as f64 / union as f64;
    let subset_ratio = intersection as f64 / target_set.len() as f64;

    let max_len = target_tokens.len().max(source_tokens.len());
    let matching = target_tokens
        .iter()
        .zip(source_tokens.iter())
        .filter(|(v, r)| v == r)
        .count();
    let sequence_sim = matching as f64 / max_len as f64;

    let weighted = 0.6 * jaccard + 0.4 * sequence_sim;
    let similarity = weighted.max(subset_ratio);

    DeepCompareResult {
        similarity,
        intersection_len: intersection,
        union_len: union,
    }
}
