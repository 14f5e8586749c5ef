//! Fingerprint Builder.
//!
//! Turns normalized token streams into a [`Fingerprint`]: a whole-diff
//! SimHash plus a stable patch-id, and one [`FileFingerprint`] per file.

use crate::config::ProvenanceConfig;
use crate::normalize::normalize_diff;
use crate::types::{FileDiffMap, FileFingerprint, Fingerprint};
use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest};
use std::collections::BTreeMap;
use std::io::Write as _;
use std::process::{Command, Stdio};
use std::time::Duration;

type Blake2b64 = Blake2b<U8>;

/// Compute a 64-bit SimHash over overlapping trigram shingles of
/// whitespace-separated tokens. Each shingle is hashed with
/// a truncated Blake2b digest; each of the 64 bits casts a +1/-1 vote
/// weighted by shingle count, and the final bit is set wherever the
/// vote sum is positive.
pub fn simhash64(text: &str) -> u64 {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return 0;
    }
    let shingles: Vec<String> = if tokens.len() < 3 {
        tokens.iter().map(|t| (*t).to_owned()).collect()
    } else {
        (0..tokens.len() - 2)
            .map(|i| format!("{} {} {}", tokens[i], tokens[i + 1], tokens[i + 2]))
            .collect()
    };

    let mut votes = [0i64; 64];
    for shingle in &shingles {
        let h = blake2b64(shingle.as_bytes());
        for (i, vote) in votes.iter_mut().enumerate() {
            if h & (1 << i) != 0 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }

    let mut fingerprint: u64 = 0;
    for (i, vote) in votes.iter().enumerate() {
        if *vote > 0 {
            fingerprint |= 1 << i;
        }
    }
    fingerprint
}

fn blake2b64(bytes: &[u8]) -> u64 {
    let mut hasher = Blake2b64::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    u64::from_be_bytes(digest.into())
}

/// Hamming distance between two 64-bit SimHash values.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// SimHash similarity as `1.0 - distance/64`.
pub fn compute_simhash_similarity(a: u64, b: u64) -> f64 {
    1.0 - (hamming_distance(a, b) as f64 / 64.0)
}

/// Compute a diff's `git patch-id --stable`, tolerating the absence of
/// `git` on `PATH` or any subprocess failure by returning `None`:
/// patch-id is an optional confidence booster, never load-bearing.
pub fn compute_patch_id(diff_text: &str) -> Option<String> {
    let mut child = Command::new("git")
        .arg("patch-id")
        .arg("--stable")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    {
        let stdin = child.stdin.as_mut()?;
        stdin.write_all(diff_text.as_bytes()).ok()?;
    }

    let output = wait_with_timeout(child, Duration::from_secs(10))?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.split_whitespace().next().map(|s| s.to_owned())
}

/// `Child::wait_with_output` has no built-in timeout; poll with a short
/// sleep instead of blocking forever on a hung `git patch-id`.
fn wait_with_timeout(
    mut child: std::process::Child,
    timeout: Duration,
) -> Option<std::process::Output> {
    let start = std::time::Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return child.wait_with_output().ok(),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return None,
        }
    }
}

/// Fingerprint every file in a [`FileDiffMap`], dropping files whose
/// normalized content is empty.
pub fn compute_file_fingerprints(
    diff_files: &FileDiffMap,
    config: &ProvenanceConfig,
) -> BTreeMap<String, FileFingerprint> {
    let mut fingerprints = BTreeMap::new();
    for (path, file_diff) in diff_files.iter() {
        let normalized = normalize_diff(file_diff, config, None);
        if normalized.is_empty() {
            continue;
        }
        fingerprints.insert(
            path.to_owned(),
            FileFingerprint {
                simhash64: simhash64(&normalized),
                patch_id: compute_patch_id(file_diff),
            },
        );
    }
    fingerprints
}

/// Build the whole-diff [`Fingerprint`] for an already branding-filtered
/// diff.
pub fn build_fingerprint(
    diff_text: &str,
    diff_files: &FileDiffMap,
    config: &ProvenanceConfig,
) -> Fingerprint {
    let norm_all = normalize_diff(diff_text, config, None);
    Fingerprint {
        simhash64: simhash64(&norm_all),
        patch_id: compute_patch_id(diff_text),
        files: compute_file_fingerprints(diff_files, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simhash_is_deterministic() {
        let text = "foo bar baz qux";
        assert_eq!(simhash64(text), simhash64(text));
    }

    #[test]
    fn simhash_of_empty_text_is_zero() {
        assert_eq!(simhash64(""), 0);
        assert_eq!(simhash64("   "), 0);
    }

    #[test]
    fn identical_text_has_similarity_one() {
        let h = simhash64("some normalized token stream here");
        assert_eq!(compute_simhash_similarity(h, h), 1.0);
    }

    #[test]
    fn hamming_distance_bounds_similarity() {
        let a = 0u64;
        let b = u64::MAX;
        assert_eq!(hamming_distance(a, b), 64);
        assert_eq!(compute_simhash_similarity(a, b), 0.0);
    }

    #[test]
    fn similar_texts_have_high_similarity() {
        let a = simhash64("int x = 1 ; return x ;");
        let b = simhash64("int x = 1 ; return x ; // comment");
        assert!(compute_simhash_similarity(a, b) > 0.8);
    }

    #[test]
    fn single_and_double_token_text_uses_tokens_as_shingles() {
        // Fewer than 3 tokens: shingles are the tokens themselves, not
        // trigrams.
        let h1 = simhash64("a");
        let h2 = simhash64("a b");
        assert_ne!(h1, 0);
        assert_ne!(h2, 0);
    }

    #[test]
    fn compute_patch_id_returns_none_without_crashing() {
        // Either git is present and returns a hex id, or it's absent and
        // this returns None; either way it must not panic.
        let result = compute_patch_id("not a real diff at all");
        assert!(result.is_none() || result.unwrap().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
