//! Exponential-backoff retry, generalized from a fixed (attempts, delay)
//! pair into a reusable policy struct so the Remote Channel can carry a
//! distinct policy per call site (connect vs. exec vs. environment
//! provisioning) without repeating the loop.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    /// The Remote Channel's default: 3 attempts, 1s initial delay, x2,
    /// capped at 10s.
    pub fn default_transport() -> Self {
        RetryPolicy::new(3, Duration::from_secs(1), 2.0, Duration::from_secs(10))
    }

    /// The Environment Controller's session-acquisition policy: 5
    /// attempts, 2s initial delay, x2, capped at 10s.
    pub fn session_acquisition() -> Self {
        RetryPolicy::new(5, Duration::from_secs(2), 2.0, Duration::from_secs(10))
    }
}

#[derive(Debug, Error)]
#[error("{label} failed after {attempts} attempts: {source}")]
pub struct RetryError<E: std::fmt::Display> {
    pub label: String,
    pub attempts: u32,
    pub source: E,
}

/// Retry a fallible operation per `policy`, sleeping with exponential
/// backoff between attempts. `f` is given the 1-based attempt number so
/// callers can decide to reconnect before retrying (e.g. on exec
/// retries, closing and reconnecting a disconnected session before the
/// next attempt).
pub fn retry<F, T, E>(policy: &RetryPolicy, label: &str, mut f: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    let mut delay = policy.initial_delay;

    for attempt in 1..=policy.max_attempts {
        match f(attempt) {
            Ok(val) => return Ok(val),
            Err(e) => {
                if attempt < policy.max_attempts {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "{} failed, retrying",
                        label,
                    );
                    thread::sleep(delay);
                    delay = Duration::from_secs_f64((delay.as_secs_f64() * policy.multiplier).min(policy.max_delay.as_secs_f64()));
                }
                last_err = Some(e);
            }
        }
    }

    Err(RetryError {
        label: label.to_string(),
        attempts: policy.max_attempts,
        source: last_err.expect("at least one attempt always runs"),
    })
}

/// Like `retry`, but stops on the first error `should_retry` rejects
/// instead of spending the rest of the attempt budget retrying a class of
/// failure retries cannot fix (e.g. bad credentials, invalid input).
pub fn retry_if<F, T, E>(
    policy: &RetryPolicy,
    label: &str,
    should_retry: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay;

    for attempt in 1..=policy.max_attempts {
        match f(attempt) {
            Ok(val) => return Ok(val),
            Err(e) => {
                if attempt == policy.max_attempts || !should_retry(&e) {
                    return Err(RetryError {
                        label: label.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "{} failed, retrying",
                    label,
                );
                thread::sleep(delay);
                delay = Duration::from_secs_f64((delay.as_secs_f64() * policy.multiplier).min(policy.max_delay.as_secs_f64()));
            }
        }
    }
    unreachable!("loop always returns on its own last iteration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn succeeds_first_try() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_millis(10));
        let result = retry(&policy, "test", |_| Ok::<_, String>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn succeeds_after_two_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_millis(10));
        let count = Cell::new(0);
        let result = retry(&policy, "test", |_| {
            let c = count.get() + 1;
            count.set(c);
            if c < 3 { Err("not yet".to_string()) } else { Ok(c) }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn exhausts_all_attempts_and_names_count() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_millis(10));
        let count = Cell::new(0);
        let result: Result<i32, _> = retry(&policy, "connect", |_| {
            count.set(count.get() + 1);
            Err::<i32, _>("boom".to_string())
        });
        let err = result.unwrap_err();
        assert_eq!(count.get(), 3);
        assert_eq!(err.attempts, 3);
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn retry_if_stops_on_first_non_retryable_error() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), 2.0, Duration::from_millis(10));
        let count = Cell::new(0);
        let result: Result<i32, _> = retry_if(&policy, "test", |_: &String| false, |_| {
            count.set(count.get() + 1);
            Err::<i32, _>("unretryable".to_string())
        });
        let err = result.unwrap_err();
        assert_eq!(count.get(), 1);
        assert_eq!(err.attempts, 1);
    }

    #[test]
    fn retry_if_keeps_retrying_while_predicate_holds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_millis(10));
        let count = Cell::new(0);
        let result = retry_if(&policy, "test", |_: &String| true, |_| {
            let c = count.get() + 1;
            count.set(c);
            if c < 3 { Err("not yet".to_string()) } else { Ok(c) }
        });
        assert_eq!(result.unwrap(), 3);
    }
}
