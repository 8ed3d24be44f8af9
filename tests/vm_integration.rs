//! End-to-end tests against a real Lima VM. These exercise `limactl`,
//! SSH, and Linux namespaces for real, so they are gated behind the
//! `vm-integration-tests` feature and are never run by a plain
//! `cargo test`.
//!
//! # Running
//!
//! ```bash
//! cargo test --features vm-integration-tests --test vm_integration
//! ```
//!
//! Requires `limactl` on `PATH`, enough resources to boot a Lima VM, and
//! several minutes for the first VM creation.

#![cfg(feature = "vm-integration-tests")]

use std::time::Duration;

use envbox_core::context::Ctx;
use envbox_env::EnvironmentController;
use envbox_vm::DEFAULT_VM_NAME;

fn controller() -> EnvironmentController {
    EnvironmentController::new(DEFAULT_VM_NAME)
}

fn project_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temp project dir")
}

#[test]
fn create_is_idempotent() {
    let ctx = Ctx::with_timeout(Duration::from_secs(300));
    let ctl = controller();
    let dir = project_dir();

    let first = ctl.create(&ctx, dir.path()).expect("first create");
    let second = ctl.create(&ctx, dir.path()).expect("second create");
    assert_eq!(first.name, second.name);

    ctl.delete(&ctx, &first.name).expect("cleanup");
}

#[test]
fn create_binds_project_path_into_workspace() {
    let ctx = Ctx::with_timeout(Duration::from_secs(300));
    let ctl = controller();
    let dir = project_dir();

    let env = ctl.create(&ctx, dir.path()).expect("create");
    let mounted = ctl
        .get_project_path(&ctx, &env.name)
        .expect("get project path")
        .expect("project path recovered from mount table");
    assert_eq!(mounted, dir.path().display().to_string());

    ctl.delete(&ctx, &env.name).expect("cleanup");
}

#[test]
fn list_includes_created_environments() {
    let ctx = Ctx::with_timeout(Duration::from_secs(300));
    let ctl = controller();
    let dir = project_dir();

    let env = ctl.create(&ctx, dir.path()).expect("create");
    let envs = ctl.list(&ctx).expect("list");
    assert!(envs.iter().any(|e| e.name == env.name));
    for e in &envs {
        assert!(envbox_core::naming::is_environment_name(&e.name));
    }

    ctl.delete(&ctx, &env.name).expect("cleanup");
}

#[test]
fn delete_removes_user_and_namespace() {
    let ctx = Ctx::with_timeout(Duration::from_secs(300));
    let ctl = controller();
    let dir = project_dir();

    let env = ctl.create(&ctx, dir.path()).expect("create");
    ctl.delete(&ctx, &env.name).expect("delete");

    assert!(!ctl.exists(&ctx, &env.name).expect("exists after delete"));
}
