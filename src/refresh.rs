//! PR fingerprint database refresh.
//!
//! Paginates a host's pull-request list, fingerprinting every diff not
//! already on file and checkpointing progress as it goes.

use crate::config::ProvenanceConfig;
use crate::db::{normalize_timestamp, FingerprintDb, PrRecord};
use crate::fingerprint::{compute_file_fingerprints, compute_patch_id, simhash64};
use crate::host::{PrInfo, ProvenanceHost};
use crate::normalize::{normalize_diff, split_diff_by_file};
use crate::sink::Sink;
use std::path::Path;

const PER_PAGE: u32 = 100;
const MAX_PAGES: u32 = 100;
const CHECKPOINT_INTERVAL: usize = 10;

/// Whether a PR should be excluded from the source-fingerprint database:
/// merges, release/branch-name PRs, and unusually large PRs
/// are unlikely to be meaningful provenance anchors and are noisy to
/// index.
pub fn should_skip_pr(title: &str, changed_files: u64) -> bool {
    let title = title.to_lowercase();
    if title.contains("merge") && title.contains("into") {
        return true;
    }
    if title.contains("release") || title.starts_with("release/") {
        return true;
    }
    if matches!(title.as_str(), "main" | "unstable" | "master") {
        return true;
    }
    changed_files > 50
}

/// Refresh `db_path`'s PR fingerprints from `host`, paginating through
/// open and closed PRs newest-first and stopping once a page is entirely
/// older than the most recent fingerprint already on file.
pub fn refresh_prs(
    host: &dyn ProvenanceHost,
    owner: &str,
    repo: &str,
    cutoff_date: &str,
    db_path: &Path,
    config: &ProvenanceConfig,
    sink: &dyn Sink,
) -> crate::error::Result<FingerprintDb> {
    let mut db = FingerprintDb::load(db_path);
    let since_created = db
        .prs
        .values()
        .map(|pr| pr.created_at.as_str())
        .max()
        .map(|s| s.to_owned())
        .unwrap_or_else(|| cutoff_date.to_owned());
    let since_created = normalize_timestamp(&since_created).unwrap_or(since_created);

    for state in ["open", "closed"] {
        let mut page = 1;
        while page <= MAX_PAGES {
            let pr_list = host.fetch_pr_list(owner, repo, state, page, PER_PAGE)?;
            if pr_list.is_empty() {
                break;
            }
            // Pages are newest-first, so once the cutoff falls inside a
            // page, `recent` holds a strict prefix of it; anything past
            // the cutoff must never reach the per-PR loop below.
            let recent: Vec<&PrInfo> = pr_list
                .iter()
                .filter(|pr| normalize_timestamp(&pr.created_at).unwrap_or_default() > since_created)
                .collect();
            let stop = recent.len() < pr_list.len();

            for pr in recent {
                let key = pr.number.to_string();
                if let Some(existing) = db.prs.get(&key) {
                    let existing_updated = normalize_timestamp(&existing.updated_at).unwrap_or_default();
                    let incoming_updated = normalize_timestamp(&pr.updated_at).unwrap_or_default();
                    if incoming_updated <= existing_updated {
                        continue;
                    }
                }
                if should_skip_pr(&pr.title, pr.changed_files) {
                    continue;
                }
                match host.fetch_pr_diff(owner, repo, pr.number) {
                    Ok(diff_text) => {
                        let diff_files = split_diff_by_file(&diff_text);
                        db.prs.insert(key, pr_record(pr, &diff_text, &diff_files, config));
                        if db.prs.len() % CHECKPOINT_INTERVAL == 0 {
                            db.repo = format!("{owner}/{repo}");
                            db.generated_at = chrono::Utc::now().to_rfc3339();
                            db.save(db_path)?;
                            sink.info(&format!("checkpoint: saved {} PRs", db.prs.len()));
                        }
                    }
                    Err(e) => sink.warn(&format!("failed PR #{}: {e}", pr.number)),
                }
            }

            if stop {
                break;
            }
            page += 1;
        }
    }

    db.repo = format!("{owner}/{repo}");
    db.generated_at = chrono::Utc::now().to_rfc3339();
    db.save(db_path)?;
    Ok(db)
}

fn pr_record(
    pr: &PrInfo,
    diff_text: &str,
    diff_files: &crate::types::FileDiffMap,
    config: &ProvenanceConfig,
) -> PrRecord {
    PrRecord {
        number: pr.number,
        state: pr.state.clone(),
        created_at: pr.created_at.clone(),
        updated_at: pr.updated_at.clone(),
        simhash64: simhash64(&normalize_diff(diff_text, config, None)),
        patch_id: compute_patch_id(diff_text),
        files: compute_file_fingerprints(diff_files, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_into_title_is_skipped() {
        assert!(should_skip_pr("Merge branch unstable into feature", 1));
    }

    #[test]
    fn release_title_is_skipped() {
        assert!(should_skip_pr("Release 8.0.0", 1));
        assert!(should_skip_pr("release/8.0", 1));
    }

    #[test]
    fn branch_name_titles_are_skipped() {
        assert!(should_skip_pr("unstable", 1));
        assert!(should_skip_pr("Master", 1));
    }

    #[test]
    fn oversized_pr_is_skipped() {
        assert!(should_skip_pr("Add a feature", 51));
        assert!(!should_skip_pr("Add a feature", 50));
    }

    #[test]
    fn ordinary_feature_pr_is_kept() {
        assert!(!should_skip_pr("Add TTL support to HGETEX", 3));
    }

    #[test]
    fn refresh_filters_out_prs_older_than_cutoff_within_a_mixed_page() {
        use crate::host::{MockHost, PrInfo, ShaRef};
        use tempfile::tempdir;

        let mut host = MockHost::default();
        host.prs.insert(
            1,
            PrInfo {
                number: 1,
                state: "closed".to_owned(),
                title: "Old PR predating the cutoff".to_owned(),
                created_at: "2020-01-01T00:00:00Z".to_owned(),
                updated_at: "2020-01-01T00:00:00Z".to_owned(),
                changed_files: 1,
                base: ShaRef { sha: "base".to_owned() },
                head: ShaRef { sha: "head".to_owned() },
            },
        );
        host.prs.insert(
            2,
            PrInfo {
                number: 2,
                state: "closed".to_owned(),
                title: "New PR after the cutoff".to_owned(),
                created_at: "2024-06-01T00:00:00Z".to_owned(),
                updated_at: "2024-06-01T00:00:00Z".to_owned(),
                changed_files: 1,
                base: ShaRef { sha: "base".to_owned() },
                head: ShaRef { sha: "head".to_owned() },
            },
        );
        host.pr_diffs.insert(
            1,
            "diff --git a/a.c b/a.c\n--- a/a.c\n+++ b/a.c\n@@ -1 +1 @@\n-x\n+y\n".to_owned(),
        );
        host.pr_diffs.insert(
            2,
            "diff --git a/b.c b/b.c\n--- a/b.c\n+++ b/b.c\n@@ -1 +1 @@\n-x\n+y\n".to_owned(),
        );

        let config = ProvenanceConfig::new(
            "redis/redis".to_owned(),
            "valkey-io/valkey".to_owned(),
            vec![],
            vec![],
            vec![],
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("prs.json.gz");

        let db = refresh_prs(
            &host,
            "redis",
            "redis",
            "2023-01-01T00:00:00Z",
            &db_path,
            &config,
            &crate::sink::NullSink,
        )
        .unwrap();

        assert!(db.prs.contains_key("2"));
        assert!(!db.prs.contains_key("1"));
    }
}
