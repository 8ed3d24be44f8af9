//! Drives the single long-lived Lima VM by shelling out to `limactl`
//! (`get_instance`, `create`, `start`, `stop`, `ensure_running`,
//! `delete`) behind the injectable [`CommandRunner`] so every invocation
//! is observable in tests.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::info;

use crate::backend::{VMInstance, VmStatus, parse_instances};
use crate::error::VmError;
use crate::guest_config::{self, GuestConfigParams};
use crate::runner::{SharedRunner, default_runner};

pub struct VmController {
    instance_name: String,
    runner: SharedRunner,
    last_config_path: Mutex<Option<PathBuf>>,
}

impl VmController {
    pub fn new(instance_name: impl Into<String>) -> Self {
        VmController::with_runner(instance_name, default_runner())
    }

    pub fn with_runner(instance_name: impl Into<String>, runner: SharedRunner) -> Self {
        VmController {
            instance_name: instance_name.into(),
            runner,
            last_config_path: Mutex::new(None),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Path to the embedded guest configuration last written to disk by
    /// `create()`, if any.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.last_config_path.lock().unwrap().clone()
    }

    fn run(&self, args: &[&str]) -> Result<crate::runner::CommandOutput, VmError> {
        let mut full = vec!["--tty=false"];
        full.extend_from_slice(args);
        self.runner.run("limactl", &full)
    }

    fn run_ok(&self, args: &[&str]) -> Result<(), VmError> {
        let output = self.run(args)?;
        if !output.success {
            return Err(VmError::BackendFailure {
                args: args.join(" "),
                stderr: output.stderr_str().trim().to_string(),
            });
        }
        Ok(())
    }

    /// `limactl --tty=false list --json <name>`. Returns `NotFound` if
    /// the instance does not exist or the backend reports nothing.
    pub fn get_instance(&self) -> Result<VMInstance, VmError> {
        let output = self.run(&["list", "--json", &self.instance_name])?;
        if !output.success {
            return Err(VmError::NotFound(self.instance_name.clone()));
        }
        let instances = parse_instances(&output.stdout)?;
        instances
            .into_iter()
            .find(|i| i.name == self.instance_name)
            .ok_or_else(|| VmError::NotFound(self.instance_name.clone()))
    }

    pub fn exists(&self) -> bool {
        self.get_instance().is_ok()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.get_instance(), Ok(i) if i.status == VmStatus::Running)
    }

    /// The full parsed instance record, for diagnostics. Unlike
    /// `is_running`/`exists` (which collapse to a bool), callers that
    /// need the SSH port, data directory, or guest login user for
    /// troubleshooting go through here.
    pub fn status_detail(&self) -> Result<VMInstance, VmError> {
        self.get_instance()
    }

    /// Write the embedded guest config to a temp file, invoke `limactl
    /// create`, and remember the rendered path.
    pub fn create(&self) -> Result<(), VmError> {
        if self.exists() {
            return Err(VmError::AlreadyExists(self.instance_name.clone()));
        }

        let params = GuestConfigParams {
            vm_name: self.instance_name.clone(),
            ..Default::default()
        };
        let tmp = guest_config::render(&params)?;
        let path = tmp.path().to_path_buf();

        info!(vm = %self.instance_name, config = %path.display(), "creating VM");
        let arg = format!("--name={}", self.instance_name);
        self.run_ok(&["create", &arg, path.to_str().unwrap_or_default()])?;

        // `limactl create` has read the file synchronously by the time
        // it returns; persist the path it used, not the (now-unlinked)
        // NamedTempFile itself.
        *self.last_config_path.lock().unwrap() = Some(path);
        Ok(())
    }

    pub fn start(&self) -> Result<(), VmError> {
        if self.is_running() {
            return Ok(());
        }
        info!(vm = %self.instance_name, "starting VM");
        self.run_ok(&["start", &self.instance_name])
    }

    pub fn stop(&self) -> Result<(), VmError> {
        if !self.exists() {
            return Err(VmError::NotFound(self.instance_name.clone()));
        }
        info!(vm = %self.instance_name, "stopping VM");
        self.run_ok(&["stop", &self.instance_name])
    }

    pub fn delete(&self, force: bool) -> Result<(), VmError> {
        info!(vm = %self.instance_name, force, "deleting VM");
        if force {
            self.run_ok(&["delete", "--force", &self.instance_name])
        } else {
            self.run_ok(&["delete", &self.instance_name])
        }
    }

    /// Create if absent, start if stopped. Idempotent once running.
    pub fn ensure_running(&self) -> Result<(), VmError> {
        match self.get_instance() {
            Ok(i) if i.status == VmStatus::Running => Ok(()),
            Ok(_) => self.start(),
            Err(VmError::NotFound(_)) => {
                self.create()?;
                self.start()
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fixtures::{FixtureRunner, failure, ok};
    use std::sync::Arc;

    #[test]
    fn exists_and_status_from_single_object_payload() {
        let runner = FixtureRunner::new().with(
            &["--tty=false", "list", "--json", "llima-box"],
            ok(r#"{"name":"llima-box","status":"Running","dir":"/x","sshLocalPort":60022,"config":{"user":{"name":"lima"}}}"#),
        );
        let ctl = VmController::with_runner("llima-box", Arc::new(runner));
        assert!(ctl.exists());
        assert!(ctl.is_running());
        assert_eq!(ctl.get_instance().unwrap().name, "llima-box");
    }

    #[test]
    fn not_found_when_backend_exits_nonzero() {
        let runner = FixtureRunner::new().with(
            &["--tty=false", "list", "--json", "llima-box"],
            failure("no instance matches"),
        );
        let ctl = VmController::with_runner("llima-box", Arc::new(runner));
        assert!(!ctl.exists());
        assert!(matches!(ctl.get_instance(), Err(VmError::NotFound(_))));
    }

    #[test]
    fn ensure_running_starts_a_stopped_instance() {
        let runner = FixtureRunner::new()
            .with(
                &["--tty=false", "list", "--json", "llima-box"],
                ok(r#"{"name":"llima-box","status":"Stopped","dir":"/x","sshLocalPort":1}"#),
            )
            .with(&["--tty=false", "start", "llima-box"], ok(""));
        let runner = Arc::new(runner);
        let ctl = VmController::with_runner("llima-box", runner.clone());
        ctl.ensure_running().unwrap();
        let calls = runner.calls();
        assert!(calls.iter().any(|c| c.contains(&"start".to_string())));
    }

    #[test]
    fn backend_failure_surfaces_stderr() {
        let runner = FixtureRunner::new()
            .with(
                &["--tty=false", "list", "--json", "llima-box"],
                failure("gone"),
            )
            .with(&["--tty=false", "stop", "llima-box"], ok(""));
        let ctl = VmController::with_runner("llima-box", Arc::new(runner));
        assert!(matches!(ctl.stop(), Err(VmError::NotFound(_))));
    }
}
