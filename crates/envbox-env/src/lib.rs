//! envbox-env: composes naming, the VM controller, and the remote
//! channel into the environment lifecycle — create, exists, list,
//! enter, delete, delete_all — over a per-project mount/PID namespace.

pub mod controller;
pub mod error;
pub mod model;
mod util;

pub use controller::EnvironmentController;
pub use error::EnvError;
pub use model::Environment;
