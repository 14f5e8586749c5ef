//! Triviality Filter.
//!
//! Pre-filters applied before fingerprinting and Layer-1 search: a
//! branding-only-change filter, a code-movement detector, and the size
//! floors enforced by the orchestrator.

use crate::config::ProvenanceConfig;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Result of [`detect_code_movement`]: whether a diff is primarily
/// reordering existing lines rather than introducing new content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodeMovement {
    pub is_trivial: bool,
    pub movement_ratio: f64,
    pub net_new_lines: i64,
}

/// Detect whether a diff is primarily code movement. A diff
/// is trivial when net-new lines fall under the floor, or when the
/// fraction of added lines that exactly match a removed line meets the
/// movement threshold.
pub fn detect_code_movement(
    diff_text: &str,
    min_net_new_lines: i64,
    code_movement_threshold: f64,
) -> CodeMovement {
    let mut added: Vec<&str> = Vec::new();
    let mut removed: Vec<&str> = Vec::new();
    for line in diff_text.split('\n') {
        if line.starts_with('+') && !line.starts_with("+++") {
            let clean = line[1..].trim();
            if !clean.is_empty() && !starts_with_comment_marker(clean) {
                added.push(clean);
            }
        } else if line.starts_with('-') && !line.starts_with("---") {
            let clean = line[1..].trim();
            if !clean.is_empty() && !starts_with_comment_marker(clean) {
                removed.push(clean);
            }
        }
    }

    let added_set: HashSet<&str> = added.iter().copied().collect();
    let removed_set: HashSet<&str> = removed.iter().copied().collect();
    let exact_matches = added_set.intersection(&removed_set).count();
    let net_new_lines = added.len() as i64 - removed.len() as i64;
    let movement_ratio = if added.is_empty() {
        0.0
    } else {
        exact_matches as f64 / added.len() as f64
    };
    let is_trivial = net_new_lines < min_net_new_lines || movement_ratio >= code_movement_threshold;

    CodeMovement {
        is_trivial,
        movement_ratio,
        net_new_lines,
    }
}

fn starts_with_comment_marker(clean: &str) -> bool {
    clean.starts_with("//") || clean.starts_with("/*") || clean.starts_with('#')
}

/// Count the added/removed (non-header) lines in a diff, compared
/// against `min_lines`.
pub fn count_diff_lines(diff_text: &str) -> usize {
    diff_text
        .split('\n')
        .filter(|line| {
            (line.starts_with('+') && !line.starts_with("+++"))
                || (line.starts_with('-') && !line.starts_with("---"))
        })
        .count()
}

struct BrandingPattern {
    regex: Regex,
    replacement: &'static str,
    capture_replacement: Option<String>,
}

fn generic_server_sentinel_patterns() -> &'static [(&'static str, &'static str)] {
    &[
        (r"\bserver([A-Z])", "BRAND$1"),
        (r"\bServer([A-Z])", "BRAND$1"),
        (r"\bsentinel([A-Z])", "BRAND$1"),
        (r"\bSentinel([A-Z])", "BRAND$1"),
    ]
}

fn build_branding_patterns(config: &ProvenanceConfig) -> Vec<BrandingPattern> {
    let mut patterns = Vec::new();
    let mut push_brand = |text: &str| {
        if text.is_empty() {
            return;
        }
        let pattern = format!(r"\b{}", regex::escape(text));
        if let Ok(re) = ascii_regex(&pattern) {
            patterns.push(BrandingPattern {
                regex: re,
                replacement: "BRAND",
                capture_replacement: None,
            });
        }
    };
    for (src_b, tgt_b) in &config.branding_pairs {
        push_brand(src_b);
        push_brand(&src_b.to_lowercase());
        push_brand(tgt_b);
        push_brand(&tgt_b.to_lowercase());
    }
    for (src_p, tgt_p) in &config.prefix_pairs {
        for prefix in [src_p.as_str(), tgt_p.as_str()] {
            if prefix.is_empty() {
                continue;
            }
            let pattern = format!(r"\b{}", regex::escape(prefix));
            if let Ok(re) = ascii_regex(&pattern) {
                patterns.push(BrandingPattern {
                    regex: re,
                    replacement: "BRAND_",
                    capture_replacement: None,
                });
            }
        }
    }
    for (pattern, replacement) in generic_server_sentinel_patterns() {
        if let Ok(re) = ascii_regex(pattern) {
            patterns.push(BrandingPattern {
                regex: re,
                replacement: "",
                capture_replacement: Some((*replacement).to_owned()),
            });
        }
    }
    patterns
}

fn ascii_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).unicode(false).build()
}

/// Normalize all branding terms in `text` to the neutral `BRAND` marker
/// so branding-only edits compare equal.
pub fn normalize_branding_terms(text: &str, config: &ProvenanceConfig) -> String {
    let mut result = text.to_owned();
    for pattern in build_branding_patterns(config) {
        result = match pattern.capture_replacement {
            Some(ref template) => pattern
                .regex
                .replace_all(&result, template.as_str())
                .into_owned(),
            None => pattern
                .regex
                .replace_all(&result, pattern.replacement)
                .into_owned(),
        };
    }
    result
}

/// Remove paired add/remove runs whose only difference is branding.
/// A run of `-` lines immediately followed by an equal-length
/// run of `+` lines is dropped entirely when every paired line is
/// brand-equivalent.
pub fn filter_branding_changes(diff_text: &str, config: &ProvenanceConfig) -> String {
    if diff_text.is_empty() {
        return diff_text.to_owned();
    }
    let lines: Vec<&str> = diff_text.split('\n').collect();
    let mut filtered = Vec::with_capacity(lines.len());
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx];
        if line.starts_with('-') && !line.starts_with("---") {
            let mut minus = vec![line];
            let mut j = idx + 1;
            while j < lines.len() && lines[j].starts_with('-') && !lines[j].starts_with("---") {
                minus.push(lines[j]);
                j += 1;
            }
            let mut plus = Vec::new();
            while j < lines.len() && lines[j].starts_with('+') && !lines[j].starts_with("+++") {
                plus.push(lines[j]);
                j += 1;
            }
            if !minus.is_empty() && minus.len() == plus.len() {
                let all_branding = minus.iter().zip(plus.iter()).all(|(m, p)| {
                    normalize_branding_terms(&m[1..], config) == normalize_branding_terms(&p[1..], config)
                });
                if all_branding {
                    idx = j;
                    continue;
                }
            }
        }
        filtered.push(line);
        idx += 1;
    }
    filtered.join("\n")
}
