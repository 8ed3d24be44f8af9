//! A minimal, clonable cancellation context.
//!
//! The Remote Channel's `exec_ctx`/`exec_stream` need a way for a caller to
//! cancel an in-flight remote command and to bound how long a call is
//! allowed to run. `Ctx` is the Rust-idiomatic stand-in: an `Arc`-shared
//! flag plus an optional deadline, checked cooperatively by whoever is
//! blocked in a worker thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CtxError {
    #[error("operation canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Clone)]
pub struct Ctx {
    canceled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Ctx {
    /// A context that never cancels and never expires.
    pub fn background() -> Self {
        Ctx {
            canceled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Ctx {
            canceled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Explicitly cancel this context. All clones observe the cancellation.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// `Some(err)` if the context has been canceled or its deadline has
    /// passed; `None` if it is still live.
    pub fn err(&self) -> Option<CtxError> {
        if self.canceled.load(Ordering::SeqCst) {
            return Some(CtxError::Canceled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(CtxError::DeadlineExceeded);
            }
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Time remaining until the deadline, or `None` if there is none.
    /// Zero if the deadline has already passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// How long a caller polling this context should sleep between checks:
    /// the smaller of a fixed poll interval and the time left to the
    /// deadline.
    pub fn poll_interval(&self, default: Duration) -> Duration {
        match self.remaining() {
            Some(left) if left < default => left.max(Duration::from_millis(1)),
            _ => default,
        }
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_done() {
        let ctx = Ctx::background();
        assert!(!ctx.is_done());
    }

    #[test]
    fn cancel_is_observed_by_clones() {
        let ctx = Ctx::background();
        let clone = ctx.clone();
        clone.cancel();
        assert_eq!(ctx.err(), Some(CtxError::Canceled));
    }

    #[test]
    fn timeout_expires() {
        let ctx = Ctx::with_timeout(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(ctx.err(), Some(CtxError::DeadlineExceeded));
    }
}
