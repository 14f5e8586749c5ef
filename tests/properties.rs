//! Property-based tests for the pure matching core: determinism,
//! symmetry, and idempotence invariants that are easy to miss with
//! hand-picked unit test fixtures.

use proptest::prelude::*;
use provenance_guard::config::ProvenanceConfig;
use provenance_guard::fingerprint::{compute_simhash_similarity, hamming_distance, simhash64};
use provenance_guard::triviality::{count_diff_lines, filter_branding_changes};

fn config() -> ProvenanceConfig {
    ProvenanceConfig::new(
        "redis/redis".to_owned(),
        "valkey-io/valkey".to_owned(),
        vec![("Redis".to_owned(), "Valkey".to_owned())],
        vec![("RM_".to_owned(), "VM_".to_owned())],
        vec![],
    )
    .unwrap()
}

proptest! {
    #[test]
    fn simhash_is_deterministic_for_any_text(s in ".{0,200}") {
        prop_assert_eq!(simhash64(&s), simhash64(&s));
    }

    #[test]
    fn hamming_distance_of_value_with_itself_is_zero(a: u64) {
        prop_assert_eq!(hamming_distance(a, a), 0);
    }

    #[test]
    fn hamming_distance_is_symmetric(a: u64, b: u64) {
        prop_assert_eq!(hamming_distance(a, b), hamming_distance(b, a));
    }

    #[test]
    fn hamming_distance_is_bounded_by_64(a: u64, b: u64) {
        prop_assert!(hamming_distance(a, b) <= 64);
    }

    #[test]
    fn simhash_similarity_stays_within_unit_interval(a: u64, b: u64) {
        let sim = compute_simhash_similarity(a, b);
        prop_assert!((0.0..=1.0).contains(&sim));
    }

    #[test]
    fn simhash_similarity_of_identical_values_is_one(a: u64) {
        prop_assert_eq!(compute_simhash_similarity(a, a), 1.0);
    }

    #[test]
    fn count_diff_lines_matches_plus_minus_count(
        plus_count in 0usize..20,
        minus_count in 0usize..20,
    ) {
        let mut diff = String::new();
        diff.push_str("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1 +1 @@\n");
        for i in 0..plus_count {
            diff.push_str(&format!("+added line {i}\n"));
        }
        for i in 0..minus_count {
            diff.push_str(&format!("-removed line {i}\n"));
        }
        prop_assert_eq!(count_diff_lines(&diff), plus_count + minus_count);
    }

    #[test]
    fn filter_branding_changes_is_idempotent_on_arbitrary_diffs(
        lines in prop::collection::vec("[-+ ][A-Za-z0-9_ ]{0,30}", 0..20),
    ) {
        let diff = lines.join("\n");
        let config = config();
        let once = filter_branding_changes(&diff, &config);
        let twice = filter_branding_changes(&once, &config);
        prop_assert_eq!(once, twice);
    }
}
