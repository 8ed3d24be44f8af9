use thiserror::Error;

use envbox_core::context::CtxError;

/// A remote command finished but exited non-zero. Carries the combined
/// stdout+stderr so the caller can decide per-step whether it is fatal,
/// rather than baking that decision into the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitError {
    pub code: i32,
}

impl std::fmt::Display for ExitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "remote command exited with status {}", self.code)
    }
}

impl std::error::Error for ExitError {}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("VM instance '{name}' is not running (status: {status})")]
    NotRunning { name: String, status: String },

    #[error(
        "no usable private key found (searched {searched} location(s)); \
         add a key to ~/.lima/_config/user or the instance directory"
    )]
    NoCredentials { searched: usize },

    #[error("failed to dial {endpoint}: {source}")]
    DialFailure {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH session failure: {0}")]
    SessionFailure(String),

    #[error("session is not connected")]
    Disconnected,

    #[error(transparent)]
    Exit(#[from] ExitError),

    #[error("operation canceled: {0}")]
    Canceled(CtxError),

    #[error(transparent)]
    Vm(#[from] envbox_vm::VmError),

    #[error(transparent)]
    Ssh(#[from] ssh2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// True for the error classes the retry policy is allowed to retry:
    /// transport-class failures, not auth or exit-status failures —
    /// lifecycle steps decide those themselves and never auto-retry.
    pub fn is_transport_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::DialFailure { .. }
                | RemoteError::SessionFailure(_)
                | RemoteError::Disconnected
                | RemoteError::Ssh(_)
        )
    }
}
