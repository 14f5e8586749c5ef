//! Unified error handling for provenance-guard.
//!
//! The pure matching core (normalize/fingerprint/triviality/candidate/deep
//! compare) never retries and never logs; it only returns `Result`. The
//! orchestrator and refresh/bootstrap pipelines are the only layers that
//! catch and degrade host errors (see [`crate::host::HostError`]).

use crate::config::ConfigError;
use crate::host::HostError;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate's unified error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem or process IO failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A diff or timestamp could not be parsed into the shape the core
    /// requires. Fatal: no partial fingerprint is ever emitted for
    /// malformed input.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Invalid configuration (bad branding/prefix pair syntax, an
    /// out-of-range threshold, etc).
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Fingerprint database could not be read or written. Read failures
    /// are normally absorbed into an empty `FingerprintDb` by the loader;
    /// this variant is for write failures, which are always fatal.
    #[error("database error: {0}")]
    Db(String),

    /// A host request failed. The orchestrator degrades to Layer-1-only
    /// on `Transient`/`RateLimited`; `NotFound` is not an `Error` at the
    /// `check` level (it surfaces as "no findings"), but refresh/bootstrap
    /// propagate lookup failures through this variant.
    #[error("host request failed: {0}")]
    Host(#[from] HostError),

    /// A resource policy (repository size ceiling, clone failure) was
    /// violated during bootstrap. Fatal; temporary directories are still
    /// cleaned up by the caller.
    #[error("resource policy violation: {0}")]
    ResourcePolicy(String),
}
