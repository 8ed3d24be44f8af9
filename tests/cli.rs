use assert_cmd::Command;
use predicates::prelude::*;

fn envbox() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("envbox").unwrap()
}

#[test]
fn test_help_exits_successfully() {
    envbox().arg("--help").assert().success();
}

#[test]
fn test_version_exits_successfully() {
    envbox()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("envbox"));
}

#[test]
fn test_no_args_shows_usage() {
    envbox().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_subcommand_fails() {
    envbox()
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_help_lists_all_subcommands() {
    let assert = envbox().arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    for cmd in ["shell", "list", "delete", "delete-all"] {
        assert!(
            output.contains(cmd),
            "Help output should list '{}' subcommand",
            cmd
        );
    }
}

#[test]
fn test_shell_help() {
    envbox()
        .args(["shell", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shell"));
}

#[test]
fn test_delete_help_lists_force_flag() {
    envbox()
        .args(["delete", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_shell_rejects_nonexistent_path() {
    envbox()
        .args(["shell", "/no/such/project/path/anywhere"])
        .assert()
        .failure();
}
