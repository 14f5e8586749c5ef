//! Shared data-model types used across the matching pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from file path (as it appears after `diff --git a/<path> b/<path>`)
/// to the slice of the unified diff for that file. Insertion order is
/// preserved but not semantically relevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiffMap {
    entries: Vec<(String, String)>,
}

impl FileDiffMap {
    pub fn new() -> Self {
        FileDiffMap::default()
    }

    pub fn insert(&mut self, path: String, diff: String) {
        if let Some(existing) = self.entries.iter_mut().find(|(p, _)| *p == path) {
            existing.1 = diff;
        } else {
            self.entries.push((path, diff));
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, d)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, d)| d.as_str())
    }
}

/// Per-file fingerprint record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub simhash64: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_id: Option<String>,
}

/// Per-diff fingerprint record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub simhash64: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_id: Option<String>,
    pub files: BTreeMap<String, FileFingerprint>,
}

/// A file matched during Layer-1 candidate search: `(path, similarity,
/// patch_id_match)`.
pub type MatchedFile = (String, f64, bool);

/// A Layer-1 candidate. Generic over the database record type
/// so the same search logic (`crate::candidate`) works for both PR and
/// commit records.
#[derive(Debug, Clone)]
pub struct Candidate<R> {
    pub key: String,
    pub entry: R,
    pub sim: f64,
    pub patch_id_match: bool,
    pub matched_files: Vec<MatchedFile>,
}

/// The kind of record a [`Finding`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    Pr,
    Commit,
}

/// The method by which a finding was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Simhash,
    SimhashPlusDeep,
}

impl MatchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMethod::Simhash => "simhash",
            MatchMethod::SimhashPlusDeep => "simhash+deep",
        }
    }
}

/// A single matched source artifact.
#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: FindingKind,
    /// PR number (as a string) or commit SHA.
    pub identifier: String,
    pub similarity: f64,
    pub method: MatchMethod,
}

impl Finding {
    /// The canonical finding line:
    /// `matches <repo> PR #<n> (similarity: <f.3>, method: ...)` or
    /// `matches <repo> commit <sha> (similarity: <f.3>, method: ...)`.
    pub fn display_line(&self, source_repo: &str) -> String {
        match self.kind {
            FindingKind::Pr => format!(
                "matches {} PR #{} (similarity: {:.3}, method: {})",
                source_repo,
                self.identifier,
                self.similarity,
                self.method.as_str()
            ),
            FindingKind::Commit => format!(
                "matches {} commit {} (similarity: {:.3}, method: {})",
                source_repo,
                self.identifier,
                self.similarity,
                self.method.as_str()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_diff_map_preserves_insertion_order() {
        let mut map = FileDiffMap::new();
        map.insert("b.rs".to_owned(), "diff b".to_owned());
        map.insert("a.rs".to_owned(), "diff a".to_owned());
        let paths: Vec<_> = map.paths().collect();
        assert_eq!(paths, vec!["b.rs", "a.rs"]);
    }

    #[test]
    fn file_diff_map_insert_overwrites_existing() {
        let mut map = FileDiffMap::new();
        map.insert("a.rs".to_owned(), "first".to_owned());
        map.insert("a.rs".to_owned(), "second".to_owned());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a.rs"), Some("second"));
    }

    #[test]
    fn finding_display_line_has_expected_format() {
        let finding = Finding {
            kind: FindingKind::Pr,
            identifier: "42".to_owned(),
            similarity: 0.912345,
            method: MatchMethod::SimhashPlusDeep,
        };
        assert_eq!(
            finding.display_line("redis/redis"),
            "matches redis/redis PR #42 (similarity: 0.912, method: simhash+deep)"
        );
    }

    #[test]
    fn finding_display_line_for_commit() {
        let finding = Finding {
            kind: FindingKind::Commit,
            identifier: "abc123".to_owned(),
            similarity: 1.0,
            method: MatchMethod::Simhash,
        };
        assert_eq!(
            finding.display_line("redis/redis"),
            "matches redis/redis commit abc123 (similarity: 1.000, method: simhash)"
        );
    }
}
