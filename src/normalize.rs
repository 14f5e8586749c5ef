//! Tokenizer & Normalizer.
//!
//! Transforms a unified diff into a canonical, branding-neutral token
//! stream. This is the pure text-processing core every other component
//! (fingerprinting, triviality detection, deep comparison) builds on.

use crate::config::ProvenanceConfig;
use crate::types::FileDiffMap;
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

const DIFF_HEADER_PREFIXES: &[&str] = &["diff --git", "index ", "--- ", "+++ ", "@@ "];

const MAILBOX_PROLOGUE_PREFIXES: &[&str] = &[
    "From ",
    "From: ",
    "Date: ",
    "Subject: ",
    "Signed-off-by: ",
    "Co-authored-by: ",
];

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(
            r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[A-Za-z_][A-Za-z0-9_]*|\d+[uUlLfF]*|[^\w\s]+"#,
        )
        .build()
        .expect("token regex is a compile-time constant")
    })
}

fn line_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"//.*").unwrap())
}

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\*.*?\*/").unwrap())
}

fn shell_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\s.*").unwrap())
}

/// Split a unified diff into per-file [`FileDiffMap`] slices. Tolerates
/// mailbox-style prologues by simply dropping prologue lines rather than
/// attaching them to a file section.
pub fn split_diff_by_file(diff_text: &str) -> FileDiffMap {
    let mut map = FileDiffMap::new();
    let mut current_file: Option<String> = None;
    let mut current_lines: Vec<&str> = Vec::new();

    for line in diff_text.split('\n') {
        if line.starts_with("diff --git") {
            if let Some(file) = current_file.take() {
                if !current_lines.is_empty() {
                    map.insert(file, current_lines.join("\n"));
                }
            }
            current_file = Some(extract_new_path(line).unwrap_or_else(|| "unknown".to_owned()));
            current_lines = vec![line];
        } else if current_file.is_some() {
            if MAILBOX_PROLOGUE_PREFIXES.iter().any(|p| line.starts_with(p)) || line == "---" {
                continue;
            }
            current_lines.push(line);
        }
        // Lines before the first "diff --git" header (including mailbox
        // prologues) are dropped; there is no file section to attach them
        // to.
    }
    if let Some(file) = current_file {
        if !current_lines.is_empty() {
            map.insert(file, current_lines.join("\n"));
        }
    }
    map
}

/// Extract the `b/<path>` target path from a `diff --git a/X b/Y` header.
fn extract_new_path(header_line: &str) -> Option<String> {
    let idx = header_line.find(" b/")?;
    Some(header_line[idx + 3..].to_owned())
}

/// Normalize a unified diff (or a single file's slice of one) into a
/// canonical newline-separated, space-separated token stream.
/// `include_context` overrides the change-line-count heuristic when
/// `Some`.
pub fn normalize_diff(
    diff_text: &str,
    config: &ProvenanceConfig,
    include_context: Option<bool>,
) -> String {
    let diff_lines: Vec<&str> = diff_text.split('\n').collect();
    let change_count = diff_lines
        .iter()
        .filter(|l| l.starts_with('+') || l.starts_with('-'))
        .count();
    let should_include_context = include_context.unwrap_or(change_count > 0 && change_count <= 5);

    let mut lines = Vec::new();
    for raw_line in diff_lines {
        let line = raw_line.trim_end();
        if DIFF_HEADER_PREFIXES.iter().any(|p| line.starts_with(p)) {
            continue;
        }
        let is_change = line.starts_with('+') || line.starts_with('-');
        let is_context = !is_change && !line.is_empty() && !line.starts_with("diff");
        if (is_context && !should_include_context) || !(is_change || is_context) {
            continue;
        }
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }

        let mut content = if !line.is_empty() { &line[1..] } else { line };
        let trimmed = content.trim();
        content = trimmed;
        if content.is_empty() {
            continue;
        }

        let stripped = strip_comments(content);
        let stripped = stripped.trim();
        if stripped.is_empty() || stripped.starts_with('*') {
            continue;
        }

        let tokens = tokenize(stripped, config);
        if !tokens.is_empty() {
            lines.push(tokens.join(" "));
        }
    }
    lines.join("\n")
}

/// Strip C `//`, C `/* */`, and shell `# ` (trailing-space-required)
/// comments from a single line of already-prefix-stripped diff content.
fn strip_comments(content: &str) -> String {
    let no_line_comment = line_comment_re().replace(content, "");
    let no_block_comment = block_comment_re().replace_all(&no_line_comment, "");
    let no_shell_comment = shell_comment_re().replace(&no_block_comment, "");
    no_shell_comment.trim().to_owned()
}

/// Lex and normalize a line of content into tokens.
fn tokenize(content: &str, config: &ProvenanceConfig) -> Vec<String> {
    token_regex()
        .find_iter(content)
        .map(|m| normalize_token(m.as_str(), config))
        .collect()
}

fn normalize_token(token: &str, config: &ProvenanceConfig) -> String {
    let first = token.as_bytes()[0];
    if first == b'"' || first == b'\'' {
        "STR".to_owned()
    } else if first.is_ascii_digit() {
        "NUM".to_owned()
    } else if first == b'_' || first.is_ascii_alphabetic() {
        if config.preserved_keywords.contains(token) {
            token.to_owned()
        } else {
            normalize_identifier(token, config)
        }
    } else {
        // Punctuation run: emitted as-is (any whitespace was already
        // excluded from the match by the `[^\w\s]+` class).
        token.to_owned()
    }
}

/// Identifier debranding (deterministic first-match-wins).
pub fn normalize_identifier(identifier: &str, config: &ProvenanceConfig) -> String {
    // Rule 1: prefix pairs.
    for (src_p, tgt_p) in &config.prefix_pairs {
        for prefix in [src_p.as_str(), tgt_p.as_str()] {
            if prefix.is_empty() {
                continue;
            }
            if identifier.starts_with(prefix) || identifier.starts_with(&prefix.to_lowercase()) {
                return format!("M_{}", &identifier[prefix.len()..]);
            }
        }
    }

    // Rule 2: branding pairs against the "<Brand>Module" convention.
    for (src_b, tgt_b) in &config.branding_pairs {
        for brand in [src_b.as_str(), tgt_b.as_str()] {
            if brand.is_empty() {
                continue;
            }
            let branded = format!("{brand}Module");
            if identifier.starts_with(&branded) {
                return format!("Module{}", &identifier[brand.len() + 6..]);
            }
            let branded_lower = format!("{}Module", brand.to_lowercase());
            if identifier.starts_with(&branded_lower) {
                return format!("module{}", &identifier[brand.len() + 6..]);
            }
        }
    }

    // Rule 3/4: collect all branding terms in deterministic insertion
    // order, since debranding must be a pure function of the input and
    // a set's iteration order is not guaranteed.
    let mut terms: Vec<String> = Vec::new();
    let mut push_term = |t: &str| {
        if !t.is_empty() {
            let lower = t.to_lowercase();
            if !terms.contains(&lower) {
                terms.push(lower);
            }
        }
    };
    for (src_b, tgt_b) in &config.branding_pairs {
        push_term(src_b);
        push_term(tgt_b);
    }
    for extra in &config.extra_branding_terms {
        push_term(extra);
    }

    let lower_id = identifier.to_lowercase();
    for term in &terms {
        // Pattern 1: prefix bare.
        if lower_id.starts_with(term.as_str()) {
            let remainder_full = &identifier[term.len()..];
            if !remainder_full.is_empty() {
                let remainder = remainder_full
                    .strip_prefix('_')
                    .unwrap_or(remainder_full);
                return if remainder.is_empty() {
                    identifier.to_owned()
                } else {
                    remainder.to_owned()
                };
            }
            // Falls through: identifier == term exactly, try the other
            // patterns (and other terms) before giving up.
        }

        // Pattern 2: prefix separated.
        let term_sep = format!("{term}_");
        if lower_id.starts_with(&term_sep) {
            return identifier[term.len() + 1..].to_owned();
        }

        // Pattern 3: infix at a word boundary.
        let upper_bound = identifier.len().saturating_sub(term.len());
        for i in 1..upper_bound {
            if identifier.len() < i + term.len() {
                break;
            }
            let slice = &identifier[i..i + term.len()];
            if slice.to_lowercase() != *term {
                continue;
            }
            let before_bytes = identifier.as_bytes();
            let before_ok = before_bytes[i - 1] == b'_' || before_bytes[i].is_ascii_uppercase();
            let after_ok = i + term.len() >= identifier.len()
                || before_bytes[i + term.len()] == b'_'
                || before_bytes[i + term.len()].is_ascii_uppercase();
            if before_ok && after_ok {
                let mut result = String::with_capacity(identifier.len() - term.len());
                result.push_str(&identifier[..i]);
                result.push_str(&identifier[i + term.len()..]);
                let bytes = result.as_bytes();
                if i > 0 && i < result.len() && bytes[i - 1] == b'_' && bytes[i] == b'_' {
                    result = format!("{}{}", &result[..i], &result[i + 1..]);
                }
                return if result.is_empty() {
                    identifier.to_owned()
                } else {
                    result
                };
            }
        }
    }
    identifier.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_valkey_config() -> ProvenanceConfig {
        ProvenanceConfig::new(
            "redis/redis".to_owned(),
            "valkey-io/valkey".to_owned(),
            vec![("Redis".to_owned(), "Valkey".to_owned())],
            vec![("RM_".to_owned(), "VM_".to_owned())],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn branding_symmetry_source_and_target() {
        let config = redis_valkey_config();
        let source = "+int *RM_GetCommandKeys(RedisModuleCtx *ctx) { return NULL; }";
        let target = "+int *VM_GetCommandKeys(ValkeyModuleCtx *ctx) { return NULL; }";
        assert_eq!(
            normalize_diff(source, &config, None),
            normalize_diff(target, &config, None)
        );
    }

    #[test]
    fn comment_neutrality_line_comment() {
        let config = redis_valkey_config();
        let plain = "+int x = 1;";
        let commented = "+int x = 1; // a trailing remark";
        assert_eq!(
            normalize_diff(plain, &config, None),
            normalize_diff(commented, &config, None)
        );
    }

    #[test]
    fn comment_neutrality_block_comment() {
        let config = redis_valkey_config();
        let plain = "+int x = 1;";
        let commented = "+int x = 1; /* inline remark */";
        assert_eq!(
            normalize_diff(plain, &config, None),
            normalize_diff(commented, &config, None)
        );
    }

    #[test]
    fn comment_neutrality_shell_comment_requires_space() {
        let config = redis_valkey_config();
        let plain = "+set x 1";
        let commented = "+set x 1 # a remark";
        assert_eq!(
            normalize_diff(plain, &config, None),
            normalize_diff(commented, &config, None)
        );
    }

    #[test]
    fn shell_comment_does_not_mangle_define() {
        // "#define" must survive because the shell-comment pattern
        // requires a trailing space after '#'.
        let config = redis_valkey_config();
        let normalized = normalize_diff("+#define FOO 1", &config, Some(true));
        assert!(normalized.contains("define"));
        assert!(normalized.contains("FOO"));
    }

    #[test]
    fn multi_pair_brand_equivalence() {
        let config = ProvenanceConfig::new(
            "redis/redis".to_owned(),
            "valkey-io/valkey".to_owned(),
            vec![
                ("Redis".to_owned(), "Valkey".to_owned()),
                ("KeyDB".to_owned(), "Valkey".to_owned()),
            ],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(
            normalize_identifier("RedisLog", &config),
            normalize_identifier("KeyDBLog", &config)
        );
        assert_eq!(
            normalize_identifier("RedisLog", &config),
            normalize_identifier("ValkeyLog", &config)
        );
    }

    #[test]
    fn debrands_identifier_with_embedded_brand() {
        let config = redis_valkey_config();
        assert_eq!(normalize_identifier("createRedisContext", &config), "createContext");
    }

    #[test]
    fn redis_connection_redis_first_occurrence_only() {
        let config = redis_valkey_config();
        assert_eq!(
            normalize_identifier("redis_connection_redis", &config),
            "connection_redis"
        );
    }

    #[test]
    fn bare_brand_identifier_is_unchanged() {
        let config = redis_valkey_config();
        assert_eq!(normalize_identifier("Redis", &config), "Redis");
    }

    #[test]
    fn module_convention_uppercase() {
        let config = redis_valkey_config();
        assert_eq!(
            normalize_identifier("RedisModuleCtx", &config),
            "ModuleCtx"
        );
    }

    #[test]
    fn module_convention_lowercase() {
        let config = redis_valkey_config();
        assert_eq!(
            normalize_identifier("redisModuleEvent", &config),
            "moduleEvent"
        );
    }

    #[test]
    fn prefix_pair_rewrites_to_m_marker() {
        let config = redis_valkey_config();
        assert_eq!(normalize_identifier("RM_GetApiVersion", &config), "M_GetApiVersion");
        assert_eq!(normalize_identifier("VM_GetApiVersion", &config), "M_GetApiVersion");
    }

    #[test]
    fn keydb_extra_term_is_applied_by_default() {
        let config = redis_valkey_config();
        assert_eq!(normalize_identifier("keydb_connect", &config), "connect");
    }

    #[test]
    fn preserved_keywords_are_not_debranded() {
        let config = redis_valkey_config();
        assert_eq!(normalize_identifier("return", &config), "return");
        assert_eq!(normalize_identifier("int", &config), "int");
    }

    #[test]
    fn string_and_numeric_literals_generalize() {
        let config = redis_valkey_config();
        let normalized = normalize_diff(r#"+char *s = "hello"; int n = 42;"#, &config, Some(true));
        assert!(normalized.contains("STR"));
        assert!(normalized.contains("NUM"));
    }

    #[test]
    fn split_diff_by_file_groups_hunks_per_path() {
        let diff = "diff --git a/src/a.c b/src/a.c\n--- a/src/a.c\n+++ b/src/a.c\n@@ -1 +1 @@\n-old\n+new\ndiff --git a/src/b.c b/src/b.c\n--- a/src/b.c\n+++ b/src/b.c\n@@ -1 +1 @@\n-x\n+y\n";
        let map = split_diff_by_file(diff);
        assert_eq!(map.len(), 2);
        assert!(map.get("src/a.c").unwrap().contains("-old"));
        assert!(map.get("src/b.c").unwrap().contains("-x"));
    }

    #[test]
    fn split_diff_by_file_ignores_mailbox_prologue() {
        let diff = "From abc Mon Sep 17 00:00:00 2001\nFrom: Jane <jane@example.com>\nDate: Mon, 1 Jan 2024 00:00:00 +0000\nSubject: [PATCH] fix\n---\ndiff --git a/f.c b/f.c\n--- a/f.c\n+++ b/f.c\n@@ -1 +1 @@\n-old\n+new\n";
        let map = split_diff_by_file(diff);
        assert_eq!(map.len(), 1);
        assert!(!map.get("f.c").unwrap().contains("Subject"));
    }

    #[test]
    fn context_included_only_for_small_change_counts() {
        let config = redis_valkey_config();
        let small = "+a\n context_line\n-b";
        let normalized = normalize_diff(small, &config, None);
        assert!(normalized.contains("context_line"));

        let mut big = String::new();
        for i in 0..10 {
            big.push_str(&format!("+line{i}\n"));
        }
        big.push_str(" context_line\n");
        let normalized_big = normalize_diff(&big, &config, None);
        assert!(!normalized_big.contains("context_line"));
    }

    #[test]
    fn explicit_include_context_overrides_heuristic() {
        let config = redis_valkey_config();
        let mut big = String::new();
        for i in 0..10 {
            big.push_str(&format!("+line{i}\n"));
        }
        big.push_str(" context_line\n");
        let normalized = normalize_diff(&big, &config, Some(true));
        assert!(normalized.contains("context_line"));
    }
}
