//! Logging sink.
//!
//! The matching core (normalize/fingerprint/triviality/candidate/deep
//! compare) stays pure and silent; only the orchestrator and the
//! refresh/bootstrap/backtest pipelines emit progress and diagnostics,
//! and they do so through this trait rather than calling `log::*`
//! directly. That keeps the core testable without a logger installed
//! and lets callers (the CLI, or a future library embedder) redirect
//! output.

/// Severity of a [`Sink`] message, mapped onto the `log` crate's levels
/// by [`LogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Where orchestration and pipeline progress messages go.
pub trait Sink {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }
    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }
    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Default sink: forwards to the `log` crate, which `main.rs` wires to
/// stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => log::debug!("{message}"),
            Level::Info => log::info!("{message}"),
            Level::Warn => log::warn!("{message}"),
            Level::Error => log::error!("{message}"),
        }
    }
}

/// A sink that discards everything. Used by library callers and tests
/// that don't want progress noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn log(&self, _level: Level, _message: &str) {}
}
