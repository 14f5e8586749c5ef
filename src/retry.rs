//! Retry / backoff / rate-limit handling for host requests: three
//! attempts with exponential backoff (1s/2s/4s) on transient failures,
//! and GitHub's `X-RateLimit-Reset` header honored on 403 with a 300s
//! wait cap and a 600s reset-too-far-in-future bailout.

use crate::host::HostError;
use crate::sink::Sink;
use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 3;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_RATE_LIMIT_WAIT: u64 = 300;
pub const MAX_RATE_LIMIT_RESET_HORIZON: u64 = 600;

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

/// Outcome a single request attempt reports back to [`with_retry`], so
/// the retry loop can decide whether to sleep-and-retry or give up.
pub enum AttemptOutcome<T> {
    Success(T),
    /// Transient failure (5xx, network error); retry with backoff.
    Retryable(HostError),
    /// Rate limited; wait `retry_after` (already clamped by the caller)
    /// and retry without counting against the attempt budget.
    RateLimited { retry_after: Duration },
    /// Permanent failure (e.g. 404, 4xx other than 429); stop
    /// immediately.
    Fatal(HostError),
}

/// Run `attempt` up to [`MAX_ATTEMPTS`] times, honoring rate-limit waits
/// and exponential backoff between retryable failures.
pub fn with_retry<T>(
    sink: &dyn Sink,
    mut attempt: impl FnMut(u32) -> AttemptOutcome<T>,
) -> Result<T, HostError> {
    let mut tries = 0;
    loop {
        match attempt(tries) {
            AttemptOutcome::Success(value) => return Ok(value),
            AttemptOutcome::Fatal(err) => return Err(err),
            AttemptOutcome::RateLimited { retry_after } => {
                sink.warn(&format!("rate limited, waiting {}s", retry_after.as_secs()));
                std::thread::sleep(retry_after);
                continue;
            }
            AttemptOutcome::Retryable(err) => {
                tries += 1;
                if tries >= MAX_ATTEMPTS {
                    return Err(err);
                }
                std::thread::sleep(backoff_delay(tries - 1));
            }
        }
    }
}

/// Compute the clamped wait for a 403 response carrying
/// `X-RateLimit-Reset: <unix timestamp>`. Returns `None` (meaning: treat
/// as a fatal 403, not a rate limit) when the reset is too far in the
/// future to wait for.
pub fn rate_limit_wait(reset_unix: i64, now_unix: i64) -> Option<Duration> {
    let raw_wait = (reset_unix - now_unix).max(0) + 1;
    if raw_wait as u64 > MAX_RATE_LIMIT_RESET_HORIZON {
        return None;
    }
    Some(Duration::from_secs((raw_wait as u64).min(MAX_RATE_LIMIT_WAIT)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use std::cell::Cell;

    #[test]
    fn succeeds_without_retry_on_first_try() {
        let result: Result<u32, HostError> = with_retry(&NullSink, |_| AttemptOutcome::Success(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn retries_transient_failures_up_to_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<u32, HostError> = with_retry(&NullSink, |_| {
            calls.set(calls.get() + 1);
            AttemptOutcome::Retryable(HostError::Transient("boom".to_owned()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), MAX_ATTEMPTS);
    }

    #[test]
    fn fatal_failure_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<u32, HostError> = with_retry(&NullSink, |_| {
            calls.set(calls.get() + 1);
            AttemptOutcome::Fatal(HostError::NotFound("missing".to_owned()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn rate_limit_wait_clamps_to_max() {
        let wait = rate_limit_wait(10_000, 0).unwrap();
        assert_eq!(wait, Duration::from_secs(MAX_RATE_LIMIT_WAIT));
    }

    #[test]
    fn rate_limit_wait_none_when_reset_too_far() {
        assert!(rate_limit_wait(10_000, 9_000).is_none());
    }

    #[test]
    fn rate_limit_wait_is_at_least_one_second() {
        let wait = rate_limit_wait(100, 100).unwrap();
        assert_eq!(wait, Duration::from_secs(1));
    }
}
