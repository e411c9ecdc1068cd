//! End-to-end tests for the `sync` and `check` commands
//!
//! These tests invoke the actual CLI binary and validate its behavior
//! from a user's perspective.

mod common;

use common::prelude::*;

fn repo_control() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("repo-control");
    cmd.env_remove("REPO_CONTROL_CACHE").arg("--color").arg("never");
    cmd
}

/// Test that --help lists both subcommands
#[test]
fn test_help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("repo-control");

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("check"));
}

/// Test that sync writes files and reports them
#[test]
fn test_sync_writes_generated_files() {
    let fixture = TestFixture::new().with_fragment("main.yaml", fragments::README);

    repo_control()
        .arg("sync")
        .arg("--repo")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[Added] readme: README.md"));

    assert_eq!(fixture.read("README.md"), "# demo\n\nMaintained by ada.\n");
    assert!(fixture
        .path()
        .join(".github/.control/metadata.json")
        .is_file());
}

/// Test that --dry-run reports without writing
#[test]
fn test_sync_dry_run_writes_nothing() {
    let fixture = TestFixture::new().with_fragment("main.yaml", fragments::README);

    repo_control()
        .arg("sync")
        .arg("--dry-run")
        .arg("--repo")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));

    assert!(!fixture.path().join("README.md").exists());
}

/// Test that check exits with 1 while changes are pending and 0 afterwards
#[test]
fn test_check_exit_codes_follow_sync() {
    let fixture = TestFixture::new()
        .with_fragment("main.yaml", fragments::README)
        .with_fragment("layout.yaml", fragments::LAYOUT);

    repo_control()
        .arg("check")
        .arg("--repo")
        .arg(fixture.path())
        .assert()
        .code(1);

    repo_control()
        .arg("sync")
        .arg("--repo")
        .arg(fixture.path())
        .assert()
        .success();

    repo_control()
        .arg("check")
        .arg("--repo")
        .arg(fixture.path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("up to date"));
}

/// Test that a conflict fails without writing anything
#[test]
fn test_conflict_is_reported() {
    let fixture = TestFixture::new()
        .with_fragment("a.yaml", fragments::README)
        .with_fragment("b.yaml", fragments::CONFLICTING_NAME);

    repo_control()
        .arg("sync")
        .arg("--repo")
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("name"));

    assert!(!fixture.path().join("README.md").exists());
}

/// Test that invalid settings are rejected
#[test]
fn test_invalid_settings_file() {
    let fixture = TestFixture::new()
        .with_fragment("main.yaml", "name: demo\n")
        .with_file(".repo-control.yaml", "control_directory: cfg\n");

    repo_control()
        .arg("check")
        .arg("--repo")
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("control_directory"));
}

/// Test that the cache path flag is honored
#[test]
fn test_cache_path_flag() {
    let fixture = TestFixture::new().with_fragment("main.yaml", "name: demo\n");
    let cache = fixture.path().join("cache/store.yaml");

    repo_control()
        .arg("sync")
        .arg("--repo")
        .arg(fixture.path())
        .arg("--cache-path")
        .arg(&cache)
        .assert()
        .success();

    assert!(cache.is_file());
}
