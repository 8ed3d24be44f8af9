//! envbox-vm: discovers, creates, and drives the single long-lived Lima
//! VM by shelling out to the `limactl` backend subprocess.

pub mod backend;
pub mod controller;
pub mod error;
pub mod guest_config;
pub mod runner;

pub use backend::{VMInstance, VmStatus};
pub use controller::VmController;
pub use error::VmError;

/// Default VM instance name: there is a single instance per installation.
pub const DEFAULT_VM_NAME: &str = "llima-box";
