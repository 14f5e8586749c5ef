//! Provenance configuration: the immutable, per-run settings consumed by
//! the tokenizer/normalizer (C1) and the triviality filter (C3).

use std::collections::HashSet;
use std::fmt;

/// Errors raised while building a [`ProvenanceConfig`] or validating
/// tunables from CLI input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A `Source:Target` pair string did not contain exactly one `:`.
    InvalidPair { argument: String, value: String },
    /// A repo string was not of the form `owner/name`.
    InvalidRepo { argument: String, value: String },
    /// A threshold was outside its valid `[0.0, 1.0]` range.
    InvalidThreshold { argument: String, value: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPair { argument, value } => write!(
                f,
                "invalid --{argument} value '{value}': expected 'Source:Target'"
            ),
            ConfigError::InvalidRepo { argument, value } => write!(
                f,
                "invalid --{argument} value '{value}': expected 'owner/name'"
            ),
            ConfigError::InvalidThreshold { argument, value } => write!(
                f,
                "invalid --{argument} value '{value}': expected a number in [0.0, 1.0]"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Default extra branding terms folded into identifier debranding.
/// `"keydb"` is a historical provenance seed, made configurable here
/// rather than hardcoded.
pub fn default_extra_branding_terms() -> Vec<String> {
    vec!["keydb".to_owned()]
}

/// The Preserved-Keywords Set: identifiers exempt
/// from debranding because they are language keywords rather than
/// branded symbols. Seeded with a curated union across the languages
/// likely to appear in the diffs this tool is pointed at (C/C++, Python,
/// and the Tcl test DSL used by Redis-family projects), exposed as
/// configuration rather than hardcoded.
pub fn default_preserved_keywords() -> HashSet<String> {
    const KEYWORDS: &[&str] = &[
        // C / C++
        "int", "char", "void", "long", "short", "double", "float", "unsigned", "signed",
        "const", "static", "volatile", "struct", "union", "enum", "typedef", "if", "else",
        "for", "while", "do", "switch", "case", "default", "break", "continue", "return",
        "goto", "sizeof", "NULL", "true", "false",
        // Python
        "def", "class", "import", "from", "try", "except", "raise", "finally", "with", "as",
        "pass", "lambda", "yield", "await", "async", "None", "True", "False", "is", "in",
        "not", "and", "or",
        // Tcl (Redis/Valkey test DSL)
        "proc", "set", "elseif", "foreach", "expr", "catch", "puts", "after", "upvar",
        "global", "variable", "namespace", "package", "source", "test", "r", "assert",
        "assert_equal", "assert_error", "assert_match",
    ];
    KEYWORDS.iter().map(|s| (*s).to_owned()).collect()
}

/// Immutable per-run configuration. Constructed once per process and
/// read-only thereafter.
#[derive(Debug, Clone)]
pub struct ProvenanceConfig {
    /// `owner/name` of the provenance-source repository.
    pub source_repo: String,
    /// `owner/name` of the candidate-target repository.
    pub target_repo: String,
    /// Ordered `(source_brand, target_brand)` pairs, e.g. `("Redis", "Valkey")`.
    pub branding_pairs: Vec<(String, String)>,
    /// Ordered `(source_prefix, target_prefix)` pairs, e.g. `("RM_", "VM_")`.
    pub prefix_pairs: Vec<(String, String)>,
    /// Substrings marking a file path as infrastructure (vendored code,
    /// build files, docs) and excluded from Layer-1 matching.
    pub infrastructure_patterns: Vec<String>,
    /// Additional lowercase branding terms folded into identifier
    /// debranding beyond `branding_pairs`.
    pub extra_branding_terms: Vec<String>,
    /// Identifiers exempt from debranding.
    pub preserved_keywords: HashSet<String>,
}

impl ProvenanceConfig {
    /// Build a config, validating that `source_repo`/`target_repo` (when
    /// non-empty) look like `owner/name`.
    pub fn new(
        source_repo: String,
        target_repo: String,
        branding_pairs: Vec<(String, String)>,
        prefix_pairs: Vec<(String, String)>,
        infrastructure_patterns: Vec<String>,
    ) -> Result<Self, ConfigError> {
        for (argument, repo) in [("source-repo", &source_repo), ("target-repo", &target_repo)] {
            if !repo.is_empty() && !repo.contains('/') {
                return Err(ConfigError::InvalidRepo {
                    argument: argument.to_owned(),
                    value: repo.clone(),
                });
            }
        }
        Ok(ProvenanceConfig {
            source_repo,
            target_repo,
            branding_pairs,
            prefix_pairs,
            infrastructure_patterns,
            extra_branding_terms: default_extra_branding_terms(),
            preserved_keywords: default_preserved_keywords(),
        })
    }

    /// Parse a CLI-style `Source1:Target1,Source2:Target2` string into
    /// ordered pairs. Either side of a pair may be empty (`:Target` or
    /// `Source:`).
    pub fn parse_pairs(argument: &str, raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
        raw.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|pair| {
                let mut parts = pair.splitn(2, ':');
                let src = parts.next().unwrap_or("").to_owned();
                let tgt = parts.next();
                match tgt {
                    Some(tgt) => Ok((src, tgt.to_owned())),
                    None => Err(ConfigError::InvalidPair {
                        argument: argument.to_owned(),
                        value: pair.to_owned(),
                    }),
                }
            })
            .collect()
    }

    pub fn with_extra_branding_terms(mut self, terms: Vec<String>) -> Self {
        self.extra_branding_terms = terms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pairs_splits_on_colon() {
        let pairs = ProvenanceConfig::parse_pairs("branding-pairs", "Redis:Valkey,KeyDB:Valkey").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("Redis".to_owned(), "Valkey".to_owned()),
                ("KeyDB".to_owned(), "Valkey".to_owned())
            ]
        );
    }

    #[test]
    fn parse_pairs_allows_empty_side() {
        let pairs = ProvenanceConfig::parse_pairs("prefix-pairs", "RM_:").unwrap();
        assert_eq!(pairs, vec![("RM_".to_owned(), String::new())]);
    }

    #[test]
    fn parse_pairs_rejects_missing_colon() {
        let err = ProvenanceConfig::parse_pairs("branding-pairs", "Redis").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPair { .. }));
    }

    #[test]
    fn new_rejects_repo_without_slash() {
        let err = ProvenanceConfig::new(
            "redis".to_owned(),
            "valkey-io/valkey".to_owned(),
            vec![],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRepo { .. }));
    }

    #[test]
    fn new_seeds_keydb_extra_term() {
        let config = ProvenanceConfig::new(
            "redis/redis".to_owned(),
            "valkey-io/valkey".to_owned(),
            vec![],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(config.extra_branding_terms, vec!["keydb".to_owned()]);
    }
}
