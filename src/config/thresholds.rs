//! Tunable thresholds, with the documented defaults.

/// Layer-1 SimHash similarity thresholds, triviality-filter floors, and
/// the Layer-2 acceptance threshold. All are overridable on the
/// command line but default to the values below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub layer1_simhash_base: f64,
    pub layer1_simhash_with_patchid: f64,
    pub layer2_similarity: f64,
    pub min_tokens: usize,
    pub min_lines: usize,
    pub min_net_new_lines: i64,
    pub code_movement_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            layer1_simhash_base: 0.80,
            layer1_simhash_with_patchid: 0.70,
            layer2_similarity: 0.85,
            min_tokens: 5,
            min_lines: 5,
            min_net_new_lines: 5,
            code_movement_threshold: 0.70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let t = Thresholds::default();
        assert_eq!(t.layer1_simhash_base, 0.80);
        assert_eq!(t.layer1_simhash_with_patchid, 0.70);
        assert_eq!(t.layer2_similarity, 0.85);
        assert_eq!(t.min_tokens, 5);
        assert_eq!(t.min_lines, 5);
        assert_eq!(t.min_net_new_lines, 5);
        assert_eq!(t.code_movement_threshold, 0.70);
    }
}
