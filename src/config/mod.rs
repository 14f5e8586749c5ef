//! Configuration module for provenance-guard
//!
//! This module provides the immutable per-run [`ProvenanceConfig`] consumed
//! by the normalizer and triviality filter, and the [`Thresholds`] tunables
//! consumed by the candidate search and orchestrator. Both are built once
//! per process from CLI arguments in `main.rs` and never mutated again.

pub mod provenance_config;
pub mod thresholds;

pub use provenance_config::{
    default_extra_branding_terms, default_preserved_keywords, ConfigError, ProvenanceConfig,
};
pub use thresholds::Thresholds;
