//! Fingerprint Database model.
//!
//! A gzip-compressed JSON document of either PR or commit fingerprint
//! records.

use crate::types::FileFingerprint;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// One fingerprinted pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrRecord {
    pub number: u64,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
    pub simhash64: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileFingerprint>,
}

/// One fingerprinted commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub date: String,
    pub simhash64: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileFingerprint>,
}

/// The persisted fingerprint database.
/// A single instance holds either PRs or commits, never both, mirroring
/// the two on-disk databases `check`/`refresh`/`bootstrap` operate on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerprintDb {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prs: BTreeMap<String, PrRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commits: BTreeMap<String, CommitRecord>,
}

impl FingerprintDb {
    pub fn new(repo: String, generated_at: String) -> Self {
        FingerprintDb {
            repo,
            generated_at,
            prs: BTreeMap::new(),
            commits: BTreeMap::new(),
        }
    }

    /// Load a gzip+JSON fingerprint database. A missing file, or one
    /// that fails to decompress/parse, degrades to an empty database:
    /// a corrupt or absent DB is not fatal to `check`.
    pub fn load(path: &Path) -> Self {
        let Ok(file) = File::open(path) else {
            return FingerprintDb::default();
        };
        let mut decoder = GzDecoder::new(file);
        let mut contents = String::new();
        if decoder.read_to_string(&mut contents).is_err() {
            return FingerprintDb::default();
        }
        serde_json::from_str(&contents).unwrap_or_default()
    }

    /// Write the database as gzip-compressed, pretty-printed JSON,
    /// creating parent directories as needed.
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::Error::Db(format!("serialize: {e}")))?;
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(json.as_bytes())?;
        encoder
            .finish()
            .map_err(|e| crate::error::Error::Db(format!("gzip write: {e}")))?;
        Ok(())
    }
}

/// Common accessors over a PR or commit record, so Layer-1 candidate
/// search (`crate::candidate`) works identically against either
/// database.
pub trait DbRecord {
    fn simhash64(&self) -> u64;
    fn patch_id(&self) -> Option<&str>;
    fn files(&self) -> &BTreeMap<String, FileFingerprint>;
    /// ISO 8601 creation timestamp (`created_at` for a PR, `date` for a
    /// commit), used for the date-cutoff filter.
    fn timestamp(&self) -> &str;
}

impl DbRecord for PrRecord {
    fn simhash64(&self) -> u64 {
        self.simhash64
    }
    fn patch_id(&self) -> Option<&str> {
        self.patch_id.as_deref()
    }
    fn files(&self) -> &BTreeMap<String, FileFingerprint> {
        &self.files
    }
    fn timestamp(&self) -> &str {
        &self.created_at
    }
}

impl DbRecord for CommitRecord {
    fn simhash64(&self) -> u64 {
        self.simhash64
    }
    fn patch_id(&self) -> Option<&str> {
        self.patch_id.as_deref()
    }
    fn files(&self) -> &BTreeMap<String, FileFingerprint> {
        &self.files
    }
    fn timestamp(&self) -> &str {
        &self.date
    }
}

/// Normalize an ISO 8601 timestamp to UTC with a trailing `Z`.
/// Already-`Z`-suffixed timestamps pass through unchanged; unparseable
/// input returns `None` rather than panicking (the candidate search
/// then treats the date filter as inapplicable).
pub fn normalize_timestamp(timestamp: &str) -> Option<String> {
    if timestamp.is_empty() {
        return None;
    }
    if timestamp.ends_with('Z') {
        return Some(timestamp.to_owned());
    }
    let parsed = DateTime::parse_from_rfc3339(timestamp).ok()?;
    let utc: DateTime<Utc> = parsed.with_timezone(&Utc);
    Some(utc.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

/// Like [`normalize_timestamp`], but for input the caller supplied
/// directly (the `--pr-date` CLI argument) rather than data already
/// resident in a fingerprint database or host response. An empty string
/// still means "no date filter", but non-empty unparseable input is a
/// caller mistake, not a missing value, so it is a fatal
/// [`crate::error::Error::Malformed`] rather than a silently-dropped
/// filter.
pub fn normalize_timestamp_strict(timestamp: &str) -> crate::error::Result<Option<String>> {
    if timestamp.is_empty() {
        return Ok(None);
    }
    normalize_timestamp(timestamp)
        .map(Some)
        .ok_or_else(|| crate::error::Error::Malformed(format!("unparseable date: {timestamp}")))
}
