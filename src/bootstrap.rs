//! Commit fingerprint database bootstrap.
//!
//! Shallow-clones the source repository, enforces a repository-size
//! ceiling, and fingerprints every commit since a cutoff date. Shells
//! out to the `git` binary directly rather than reimplementing
//! clone/checkout/rev-list against a lower-level plumbing library,
//! which has no single call matching `git clone --no-checkout
//! --single-branch`.

use crate::config::ProvenanceConfig;
use crate::db::{CommitRecord, FingerprintDb};
use crate::fingerprint::{compute_patch_id, simhash64};
use crate::normalize::normalize_diff;
use crate::sink::Sink;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Repository packed-object size ceiling, in KiB, above which bootstrap
/// refuses to clone: a 1 GiB guard against cloning something
/// unreasonably large in CI.
pub const MAX_REPO_SIZE_KB: u64 = 1_048_576;

const PROGRESS_INTERVAL: usize = 100;

fn run(cmd: &mut Command) -> crate::error::Result<std::process::Output> {
    cmd.output().map_err(crate::error::Error::Io)
}

fn ensure_success(output: &std::process::Output, what: &str) -> crate::error::Result<()> {
    if output.status.success() {
        Ok(())
    } else {
        Err(crate::error::Error::ResourcePolicy(format!(
            "{what} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )))
    }
}

fn restrict_permissions(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(dir) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            let _ = std::fs::set_permissions(dir, perms);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}

fn repo_size_kb(repo_dir: &Path) -> crate::error::Result<u64> {
    let output = run(Command::new("git")
        .args(["count-objects", "-v"])
        .current_dir(repo_dir))?;
    ensure_success(&output, "git count-objects")?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(value) = line.strip_prefix("size-pack:") {
            return Ok(value.trim().parse().unwrap_or(0));
        }
    }
    Ok(0)
}

/// Build (or extend) a commit fingerprint database from a shallow clone
/// of `source_url` on `branch`, starting at `cutoff_date`.
pub fn bootstrap_commits(
    source_url: &str,
    source_repo: &str,
    branch: &str,
    cutoff_date: &str,
    db_path: &Path,
    config: &ProvenanceConfig,
    sink: &dyn Sink,
) -> crate::error::Result<FingerprintDb> {
    let temp_dir = TempDir::new()?;
    let repo_dir: PathBuf = temp_dir.path().to_path_buf();
    restrict_permissions(&repo_dir);

    sink.info(&format!("cloning {source_url} into {}", repo_dir.display()));
    let clone = run(Command::new("git")
        .args([
            "clone",
            "--quiet",
            "--no-checkout",
            "--single-branch",
            "--branch",
            branch,
            source_url,
        ])
        .arg(&repo_dir))?;
    ensure_success(&clone, "git clone")?;

    let hooks_off = run(Command::new("git")
        .args(["config", "core.hooksPath", "/dev/null"])
        .current_dir(&repo_dir))?;
    ensure_success(&hooks_off, "git config")?;

    let size_kb = repo_size_kb(&repo_dir)?;
    if size_kb > MAX_REPO_SIZE_KB {
        return Err(crate::error::Error::ResourcePolicy(format!(
            "repository too large: {size_kb}KB exceeds {MAX_REPO_SIZE_KB}KB ceiling"
        )));
    }

    let checkout = run(Command::new("git")
        .args(["checkout", "--quiet", branch])
        .current_dir(&repo_dir))?;
    ensure_success(&checkout, "git checkout")?;

    sink.info(&format!("enumerating commits from {cutoff_date}"));
    let rev_list = run(Command::new("git")
        .args(["rev-list", "--reverse", &format!("--since={cutoff_date}"), "HEAD"])
        .current_dir(&repo_dir))?;
    ensure_success(&rev_list, "git rev-list")?;
    let shas: Vec<String> = String::from_utf8_lossy(&rev_list.stdout)
        .lines()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect();

    let mut db = FingerprintDb::load(db_path);
    let total = shas.len();
    for (idx, sha) in shas.iter().enumerate() {
        if db.commits.contains_key(sha) {
            continue;
        }
        let show = run(Command::new("git")
            .args(["show", "--no-color", sha])
            .current_dir(&repo_dir))?;
        let patch = String::from_utf8_lossy(&show.stdout).into_owned();

        let date_output = run(Command::new("git")
            .args(["show", "-s", "--format=%cI", sha])
            .current_dir(&repo_dir))?;
        let date = String::from_utf8_lossy(&date_output.stdout).trim().to_owned();

        db.commits.insert(
            sha.clone(),
            CommitRecord {
                sha: sha.clone(),
                date,
                simhash64: simhash64(&normalize_diff(&patch, config, None)),
                patch_id: compute_patch_id(&patch),
                files: BTreeMap::new(),
            },
        );
        if (idx + 1) % PROGRESS_INTERVAL == 0 {
            sink.info(&format!("processed {}/{total}", idx + 1));
        }
    }

    db.repo = source_repo.to_owned();
    db.generated_at = chrono::Utc::now().to_rfc3339();
    db.save(db_path)?;
    sink.info(&format!("wrote {} commits to {}", db.commits.len(), db_path.display()));
    Ok(db)
}
