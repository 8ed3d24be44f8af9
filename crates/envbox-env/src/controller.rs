//! Environment lifecycle: create, exists, list, enter, delete,
//! delete_all, get_project_path — composing naming, the VM controller,
//! and the remote channel to stand up a per-project namespace.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use envbox_core::context::Ctx;
use envbox_core::naming;
use envbox_core::retry::RetryPolicy;
use envbox_remote::{RemoteError, RemoteSession, connect_with_retry};
use envbox_vm::VmController;

use crate::error::EnvError;
use crate::model::Environment;
use crate::util::{quote_argv, shell_quote};

/// Settle time after backgrounding the namespace-holder process, before
/// the controller verifies it is alive.
const NAMESPACE_SETTLE: Duration = Duration::from_millis(500);

pub struct EnvironmentController {
    vm_instance_name: String,
}

impl EnvironmentController {
    pub fn new(vm_instance_name: impl Into<String>) -> Self {
        EnvironmentController {
            vm_instance_name: vm_instance_name.into(),
        }
    }

    /// Ensure the VM is running and return a connected session, retried
    /// with 5 attempts, 2s initial backoff, 10s cap.
    fn connected_session(&self) -> Result<RemoteSession, EnvError> {
        VmController::new(&self.vm_instance_name).ensure_running()?;
        let session = RemoteSession::new(&self.vm_instance_name)?;
        connect_with_retry(&session, &RetryPolicy::session_acquisition())
            .map_err(|e| EnvError::Remote(RemoteError::SessionFailure(e.to_string())))?;
        Ok(session)
    }

    /// Idempotent: returns the existing environment if one is already
    /// provisioned for `project_path`.
    pub fn create(&self, ctx: &Ctx, project_path: &Path) -> Result<Environment, EnvError> {
        let absolute = resolve_absolute(project_path)?;
        let name = naming::generate(&absolute)?;
        let session = self.connected_session()?;

        if probe_exists(&session, &name)? {
            info!(%name, "environment already provisioned");
            return Ok(Environment {
                name,
                project_path: absolute.display().to_string(),
            });
        }
        if ctx.is_done() {
            return Err(EnvError::Canceled);
        }

        // A crash between useradd and namespace creation leaves a user
        // with no namespace.pid, which `probe_exists` correctly reports
        // as "does not exist". Detect that orphan here and clear it
        // before re-running the full sequence, so `create` stays
        // idempotent across that non-atomic window.
        if user_exists(&session, &name)? {
            warn!(%name, "found orphaned user with no namespace; repairing");
            self.rollback_user(&session, &name);
        }

        self.provision(ctx, &session, &name, &absolute)?;

        Ok(Environment {
            name,
            project_path: absolute.display().to_string(),
        })
    }

    fn provision(
        &self,
        ctx: &Ctx,
        session: &RemoteSession,
        name: &str,
        project_path: &Path,
    ) -> Result<(), EnvError> {
        let (_, exit) = session.exec(&format!("sudo useradd -m -s /bin/bash {name}"))?;
        if let Some(e) = exit {
            return Err(EnvError::UserCreate {
                name: name.to_string(),
                output: e.to_string(),
            });
        }

        session.exec(&format!("sudo mkdir -p /envs/{name}"))?;

        if ctx.is_done() {
            self.rollback_user(session, name);
            return Err(EnvError::Canceled);
        }

        let spawn_ns = format!(
            "sudo bash -c 'unshare --mount --pid --fork --propagation private \
             bash -c \"exec sleep infinity\" </dev/null >/envs/{name}/namespace.log 2>&1 & \
             echo $! | sudo tee /envs/{name}/namespace.pid >/dev/null'"
        );
        let (_, exit) = session.exec(&spawn_ns)?;
        if let Some(e) = exit {
            self.rollback_user(session, name);
            return Err(EnvError::NamespaceCreate {
                name: name.to_string(),
                output: e.to_string(),
            });
        }

        std::thread::sleep(NAMESPACE_SETTLE);

        let pid = match self.read_namespace_pid(session, name)? {
            Some(pid) => pid,
            None => {
                self.rollback_user(session, name);
                return Err(EnvError::NamespaceCreate {
                    name: name.to_string(),
                    output: "namespace.pid missing after settle delay".to_string(),
                });
            }
        };
        let (_, exit) = session.exec(&format!("sudo kill -0 {pid} 2>/dev/null"))?;
        if exit.is_some() {
            self.rollback_user(session, name);
            return Err(EnvError::NamespaceCreate {
                name: name.to_string(),
                output: format!("namespace-holder process {pid} is not alive"),
            });
        }

        if ctx.is_done() {
            self.rollback_user(session, name);
            return Err(EnvError::Canceled);
        }

        self.bind_workspace(session, name, pid, project_path)
    }

    fn bind_workspace(
        &self,
        session: &RemoteSession,
        name: &str,
        pid: u32,
        project_path: &Path,
    ) -> Result<(), EnvError> {
        let escaped_path = shell_quote(&project_path.display().to_string());
        let script = format!(
            "sudo nsenter --mount --target={pid} bash -c {}",
            shell_quote(&format!(
                "mkdir -p /workspace && mount --bind {escaped_path} /workspace && chown -R {name}:{name} /workspace"
            ))
        );
        let (_, exit) = session.exec(&script)?;
        if let Some(e) = exit {
            self.rollback_user(session, name);
            return Err(EnvError::BindMount {
                name: name.to_string(),
                output: e.to_string(),
            });
        }
        Ok(())
    }

    fn read_namespace_pid(&self, session: &RemoteSession, name: &str) -> Result<Option<u32>, EnvError> {
        let (out, exit) = session.exec(&format!("sudo cat /envs/{name}/namespace.pid"))?;
        if exit.is_some() {
            return Ok(None);
        }
        Ok(out.trim().parse::<u32>().ok())
    }

    fn rollback_user(&self, session: &RemoteSession, name: &str) {
        warn!(%name, "rolling back partially provisioned environment");
        let _ = session.exec(&format!("sudo userdel -r {name}"));
    }

    pub fn exists(&self, _ctx: &Ctx, name: &str) -> Result<bool, EnvError> {
        validate_name(name)?;
        let session = self.connected_session()?;
        probe_exists(&session, name)
    }

    pub fn list(&self, _ctx: &Ctx) -> Result<Vec<Environment>, EnvError> {
        let session = self.connected_session()?;
        let (out, exit) = session.exec("ls -1 /envs/ 2>/dev/null")?;
        if exit.is_some() {
            return Ok(Vec::new());
        }
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|name| Environment {
                name: name.to_string(),
                project_path: String::new(),
            })
            .collect())
    }

    pub fn delete(&self, _ctx: &Ctx, name: &str) -> Result<(), EnvError> {
        validate_name(name)?;
        let session = self.connected_session()?;
        if !probe_exists(&session, name)? {
            return Err(EnvError::UnknownEnvironment(name.to_string()));
        }

        // Best-effort: kill any remaining processes owned by the user
        // before removing the account.
        let _ = session.exec(&format!("sudo pkill -u {name}"));

        let (_, exit) = session.exec(&format!("sudo userdel -r {name}"))?;
        if let Some(e) = exit {
            return Err(EnvError::Delete {
                name: name.to_string(),
                output: e.to_string(),
            });
        }
        Ok(())
    }

    /// Best-effort: continues past individual failures and aggregates
    /// them.
    pub fn delete_all(&self, ctx: &Ctx) -> Result<(), EnvError> {
        let envs = self.list(ctx)?;
        let mut failures = Vec::new();
        for env in envs {
            if let Err(e) = self.delete(ctx, &env.name) {
                failures.push((env.name, e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EnvError::Aggregate(failures))
        }
    }

    /// Runs an interactive command inside the environment via
    /// `exec_interactive`, so the caller's terminal is connected
    /// end-to-end.
    pub fn enter(&self, _ctx: &Ctx, env: &Environment, argv: &[String]) -> Result<(), EnvError> {
        validate_name(&env.name)?;
        let session = self.connected_session()?;
        let pid = self
            .read_namespace_pid(&session, &env.name)?
            .ok_or_else(|| EnvError::UnknownEnvironment(env.name.clone()))?;

        let inner = if argv.is_empty() {
            "exec bash".to_string()
        } else {
            format!("exec bash -c {}", shell_quote(&quote_argv(argv)))
        };
        let user_cmd = format!("cd /workspace && {inner}");
        let full = format!(
            "sudo nsenter --mount --target={pid} su - {user} -c {cmd}",
            pid = pid,
            user = env.name,
            cmd = shell_quote(&user_cmd),
        );
        session.exec_interactive(&full)?;
        Ok(())
    }

    /// Best-effort recovery of the project path from the namespace's
    /// mount table.
    pub fn get_project_path(&self, _ctx: &Ctx, name: &str) -> Result<Option<String>, EnvError> {
        validate_name(name)?;
        let session = self.connected_session()?;
        let pid = match self.read_namespace_pid(&session, name)? {
            Some(pid) => pid,
            None => return Err(EnvError::UnknownEnvironment(name.to_string())),
        };

        let (mounts, exit) =
            session.exec(&format!("sudo nsenter --mount --target={pid} cat /proc/self/mounts"))?;
        if exit.is_some() {
            return Ok(None);
        }

        let own_home_prefix = format!("/home/{name}");
        for line in mounts.lines() {
            let Some(target) = line.split_whitespace().nth(1) else {
                continue;
            };
            let is_host_mount_root = target.starts_with("/Users/")
                || target.starts_with("/home/")
                || target.starts_with("/Volumes/");
            if is_host_mount_root && !target.starts_with(&own_home_prefix) {
                return Ok(Some(target.to_string()));
            }
        }
        Ok(None)
    }
}

fn user_exists(session: &RemoteSession, name: &str) -> Result<bool, EnvError> {
    let (_, exit) = session.exec(&format!("sudo id {name} >/dev/null 2>&1"))?;
    Ok(exit.is_none())
}

/// All three must hold for `exists` to report true: the user, the PID
/// file, and a live process.
fn probe_exists(session: &RemoteSession, name: &str) -> Result<bool, EnvError> {
    if !user_exists(session, name)? {
        return Ok(false);
    }
    let (out, exit) = session.exec(&format!("sudo cat /envs/{name}/namespace.pid 2>/dev/null"))?;
    if exit.is_some() {
        return Ok(false);
    }
    let Some(pid) = out.trim().parse::<u32>().ok() else {
        return Ok(false);
    };
    let (_, exit) = session.exec(&format!("sudo kill -0 {pid} 2>/dev/null"))?;
    Ok(exit.is_none())
}

fn resolve_absolute(path: &Path) -> Result<std::path::PathBuf, EnvError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        EnvError::InvalidPath(format!("{} does not exist or is inaccessible: {e}", path.display()))
    })?;
    if !metadata.is_dir() {
        return Err(EnvError::InvalidPath(format!("{} is not a directory", path.display())));
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .map_err(|e| EnvError::InvalidPath(e.to_string()))
    }
}

fn validate_name(name: &str) -> Result<(), EnvError> {
    if naming::is_valid_name(name) {
        Ok(())
    } else {
        Err(EnvError::InvalidName(name.to_string()))
    }
}
