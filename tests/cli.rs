//! End-to-end CLI tests driving the `provenance-guard` binary directly.

use assert_cmd::Command;
use predicates::prelude::*;
use provenance_guard::config::ProvenanceConfig;
use provenance_guard::db::{FingerprintDb, PrRecord};
use provenance_guard::fingerprint::build_fingerprint;
use provenance_guard::normalize::split_diff_by_file;
use std::io::Write;

fn sample_diff() -> &'static str {
    "diff --git a/src/cmd.c b/src/cmd.c\n\
--- a/src/cmd.c\n\
+++ b/src/cmd.c\n\
@@ -1,3 +1,8 @@\n\
+int provenanceHandler(client *c) {\n\
+    addReply(c, shared.ok);\n\
+    return 0;\n\
+}\n\
+int secondHelper(void) { return 42; }\n\
+int thirdHelper(int n) { return n * 2; }\n"
}

fn write_diff_file(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("input.diff");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn empty_db_file(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    FingerprintDb::default().save(&path).unwrap();
    path
}

#[test]
fn check_with_no_database_matches_exits_success() {
    let dir = tempfile::tempdir().unwrap();
    let diff_path = write_diff_file(dir.path(), sample_diff());
    let pr_db = empty_db_file(dir.path(), "prs.json.gz");
    let commit_db = empty_db_file(dir.path(), "commits.json.gz");

    Command::cargo_bin("provenance-guard")
        .unwrap()
        .args([
            "check",
            "--source-repo",
            "redis/redis",
            "--target-repo",
            "valkey-io/valkey",
            "--diff-file",
        ])
        .arg(&diff_path)
        .arg("--pr-db")
        .arg(&pr_db)
        .arg("--commit-db")
        .arg(&commit_db)
        .arg("--no-host")
        .assert()
        .success();
}

#[test]
fn check_flags_a_seeded_match_and_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let diff = sample_diff();
    let diff_path = write_diff_file(dir.path(), diff);

    let config = ProvenanceConfig::new(
        "redis/redis".to_owned(),
        "valkey-io/valkey".to_owned(),
        vec![("Redis".to_owned(), "Valkey".to_owned())],
        vec![],
        vec![],
    )
    .unwrap();
    let diff_files = split_diff_by_file(diff);
    let fingerprint = build_fingerprint(diff, &diff_files, &config);

    let mut pr_db = FingerprintDb::new("redis/redis".to_owned(), "2024-01-01T00:00:00Z".to_owned());
    pr_db.prs.insert(
        "99".to_owned(),
        PrRecord {
            number: 99,
            state: "closed".to_owned(),
            created_at: "2020-01-01T00:00:00Z".to_owned(),
            updated_at: "2020-01-01T00:00:00Z".to_owned(),
            simhash64: fingerprint.simhash64,
            patch_id: fingerprint.patch_id.clone(),
            files: fingerprint.files.clone(),
        },
    );
    let pr_db_path = dir.path().join("prs.json.gz");
    pr_db.save(&pr_db_path).unwrap();
    let commit_db = empty_db_file(dir.path(), "commits.json.gz");

    Command::cargo_bin("provenance-guard")
        .unwrap()
        .args([
            "check",
            "--source-repo",
            "redis/redis",
            "--target-repo",
            "valkey-io/valkey",
            "--diff-file",
        ])
        .arg(&diff_path)
        .arg("--pr-db")
        .arg(&pr_db_path)
        .arg("--commit-db")
        .arg(&commit_db)
        .arg("--no-host")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("matches redis/redis PR #99"));
}

#[test]
fn check_missing_required_flag_fails_with_usage() {
    Command::cargo_bin("provenance-guard")
        .unwrap()
        .args(["check", "--source-repo", "redis/redis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("target-repo").or(predicate::str::contains("required")));
}

#[test]
fn invalid_repo_format_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let diff_path = write_diff_file(dir.path(), sample_diff());
    let pr_db = empty_db_file(dir.path(), "prs.json.gz");
    let commit_db = empty_db_file(dir.path(), "commits.json.gz");

    Command::cargo_bin("provenance-guard")
        .unwrap()
        .args([
            "check",
            "--source-repo",
            "not-a-valid-repo",
            "--target-repo",
            "valkey-io/valkey",
            "--diff-file",
        ])
        .arg(&diff_path)
        .arg("--pr-db")
        .arg(&pr_db)
        .arg("--commit-db")
        .arg(&commit_db)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("owner/name"));
}

#[test]
fn help_lists_all_subcommands() {
    Command::cargo_bin("provenance-guard")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("bootstrap"))
        .stdout(predicate::str::contains("backtest"));
}
