//! Retry wrapper over `connect`/`exec`, built on
//! `envbox_core::retry::retry_if`. Only transport-class failures
//! (`RemoteError::is_transport_retryable`) burn an attempt; auth and
//! exit-status failures return immediately since no amount of retrying
//! fixes a missing key or a bad command. On exec retries, a disconnected
//! session is closed and reconnected before the next attempt.

use envbox_core::retry::{RetryError, RetryPolicy, retry_if};

use crate::error::{ExitError, RemoteError};
use crate::session::RemoteSession;

pub fn connect_with_retry(
    session: &RemoteSession,
    policy: &RetryPolicy,
) -> Result<(), RetryError<RemoteError>> {
    retry_if(policy, "connect", RemoteError::is_transport_retryable, |_attempt| {
        session.connect()
    })
}

pub fn exec_with_retry(
    session: &RemoteSession,
    policy: &RetryPolicy,
    cmd: &str,
) -> Result<(String, Option<ExitError>), RetryError<RemoteError>> {
    retry_if(policy, "exec", RemoteError::is_transport_retryable, |attempt| {
        if attempt > 1 && !session.is_connected() {
            session.close();
            session.connect()?;
        }
        session.exec(cmd)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn retry_reports_attempt_count_on_exhaustion() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_millis(5));
        let count = Cell::new(0);
        let result: Result<i32, _> = retry_if(&policy, "exec", RemoteError::is_transport_retryable, |_| {
            count.set(count.get() + 1);
            Err::<i32, _>(RemoteError::Disconnected)
        });
        let err = result.unwrap_err();
        assert_eq!(count.get(), 3);
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn non_transport_errors_fail_without_retry() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), 2.0, Duration::from_millis(5));
        let count = Cell::new(0);
        let result: Result<i32, _> = retry_if(&policy, "connect", RemoteError::is_transport_retryable, |_| {
            count.set(count.get() + 1);
            Err::<i32, _>(RemoteError::NoCredentials { searched: 2 })
        });
        let err = result.unwrap_err();
        assert_eq!(count.get(), 1);
        assert_eq!(err.attempts, 1);
    }
}
