use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("'limactl' not found on PATH; install it with 'brew install lima' (https://lima-vm.io)")]
    BackendUnavailable,

    #[error("limactl {args} failed: {stderr}")]
    BackendFailure { args: String, stderr: String },

    #[error("failed to parse limactl output: {0}")]
    BackendProtocolError(String),

    #[error("VM instance '{0}' not found")]
    NotFound(String),

    #[error("VM instance '{0}' already exists")]
    AlreadyExists(String),

    #[error("VM instance '{name}' is not running (status: {status})")]
    NotRunning { name: String, status: String },

    #[error("failed to render embedded guest configuration: {0}")]
    ConfigRender(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
