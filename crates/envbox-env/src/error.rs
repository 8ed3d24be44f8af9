use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("{0}")]
    InvalidPath(String),

    #[error("invalid environment name '{0}'")]
    InvalidName(String),

    #[error("environment '{0}' not found")]
    UnknownEnvironment(String),

    #[error("failed to create user '{name}': {output}")]
    UserCreate { name: String, output: String },

    #[error("failed to create namespace for '{name}': {output}")]
    NamespaceCreate { name: String, output: String },

    #[error("failed to bind-mount project into '{name}': {output}")]
    BindMount { name: String, output: String },

    #[error("failed to delete environment '{name}': {output}")]
    Delete { name: String, output: String },

    #[error("{} environment(s) failed to delete", .0.len())]
    Aggregate(Vec<(String, EnvError)>),

    #[error("operation canceled")]
    Canceled,

    #[error(transparent)]
    Remote(#[from] envbox_remote::RemoteError),

    #[error(transparent)]
    Vm(#[from] envbox_vm::VmError),
}

impl From<envbox_core::naming::InvalidPath> for EnvError {
    fn from(e: envbox_core::naming::InvalidPath) -> Self {
        EnvError::InvalidPath(e.to_string())
    }
}
