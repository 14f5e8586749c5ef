//! provenance-guard library
//!
//! Detects whether a change to a target repository was copied or
//! lightly adapted from a known source repository. The pure matching
//! core (tokenizer/normalizer, fingerprint builder, triviality filter,
//! candidate search, deep comparator) never touches the network or the
//! filesystem; the orchestrator, database, host, and pipeline modules
//! wire it up into the `check`/`refresh`/`bootstrap`/`backtest`
//! workflows exposed by the `provenance-guard` binary.
//!
//! # Examples
//!
//! ```rust
//! use provenance_guard::config::ProvenanceConfig;
//! use provenance_guard::normalize::normalize_diff;
//!
//! let config = ProvenanceConfig::new(
//!     "redis/redis".to_owned(),
//!     "valkey-io/valkey".to_owned(),
//!     vec![("Redis".to_owned(), "Valkey".to_owned())],
//!     vec![],
//!     vec![],
//! )?;
//! let normalized = normalize_diff("+int x = 1;", &config, Some(true));
//! assert!(normalized.contains("NUM"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backtest;
pub mod bootstrap;
pub mod candidate;
pub mod config;
pub mod db;
pub mod deep_compare;
pub mod error;
pub mod fingerprint;
pub mod host;
pub mod normalize;
pub mod orchestrate;
pub mod refresh;
pub mod retry;
pub mod sink;
pub mod triviality;
pub mod types;

pub use error::{Error, Result};
