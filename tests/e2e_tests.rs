//! End-to-end tests for the spackdev CLI
//!
//! These tests verify:
//! - Resolution output in the modes that need no live package index
//! - Environment files written by `generate`
//! - Error reporting, including the CI hint, and exit codes

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"
[[dependency]]
spec = "zlib@1.2.11:"

[[dependency]]
spec = "cmake@3.20:3.26 ~doc"

[[dependency]]
spec = "openmpi@4.0:"
when = "+mpi"
"#;

#[allow(deprecated)]
fn spackdev_cmd() -> Command {
    let mut cmd = Command::cargo_bin("spackdev").unwrap();
    cmd.env_remove("CI").env_remove("RUST_LOG");
    cmd
}

/// Create a project directory holding `spackdev.toml`
fn create_test_project() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    fs::write(temp_dir.path().join("spackdev.toml"), CONFIG).unwrap();
    temp_dir
}

#[test]
fn test_resolve_any() {
    let project = create_test_project();

    spackdev_cmd()
        .current_dir(project.path())
        .args(["resolve", "--any"])
        .assert()
        .success()
        .stdout(predicate::str::contains("zlib @1.2.11:"))
        .stdout(predicate::str::contains("cmake ~doc @3.20:3.26"))
        .stdout(predicate::str::contains("When +mpi:"))
        .stdout(predicate::str::contains("3 specs in 2 groups (any)"));
}

#[test]
fn test_resolve_minimum_json() {
    let project = create_test_project();

    let output = spackdev_cmd()
        .current_dir(project.path())
        .args(["resolve", "--minimum", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["mode"], "minimum");
    assert_eq!(json["groups"][0]["when"], Value::Null);
    assert_eq!(json["groups"][0]["specs"][0], "cmake ~doc @3.20");
    assert_eq!(json["groups"][0]["specs"][1], "zlib @1.2.11");
    assert_eq!(json["groups"][1]["when"], "+mpi");
    assert_eq!(json["groups"][1]["specs"][0], "openmpi @4.0");
}

#[test]
fn test_resolve_quiet() {
    let project = create_test_project();

    spackdev_cmd()
        .current_dir(project.path())
        .args(["--quiet", "resolve", "--minimum"])
        .assert()
        .success()
        .stdout("cmake ~doc @3.20\nzlib @1.2.11\nopenmpi @4.0 (when +mpi)\n");
}

#[test]
fn test_mode_flags_conflict() {
    let project = create_test_project();

    spackdev_cmd()
        .current_dir(project.path())
        .args(["resolve", "--any", "--minimum"])
        .assert()
        .failure();
}

#[test]
fn test_generate_writes_environment() {
    let project = create_test_project();
    let root = project.path().join("dev-envs").join("dev");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("spack.lock"), "{}").unwrap();

    spackdev_cmd()
        .current_dir(project.path())
        .args(["generate", "dev", "--minimum"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated environment 'dev'"))
        .stdout(predicate::str::contains("removed stale spack.lock"));

    let manifest: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(root.join("spack.yaml")).unwrap()).unwrap();
    assert_eq!(manifest["spack"]["view"], serde_yaml::Value::Bool(false));
    assert_eq!(
        manifest["spack"]["concretizer"]["unify"],
        serde_yaml::Value::Bool(true)
    );
    assert_eq!(
        manifest["spack"]["definitions"][0]["_dev"][1],
        serde_yaml::Value::from("zlib @1.2.11")
    );
    assert_eq!(
        manifest["spack"]["specs"][0],
        serde_yaml::Value::from("$_dev")
    );

    let gitignore = fs::read_to_string(root.join(".gitignore")).unwrap();
    assert!(gitignore.contains("/**\n!/spack.yaml\n"));
    assert!(!root.join("spack.lock").exists());
}

#[test]
fn test_generate_with_explicit_config() {
    let project = create_test_project();
    let elsewhere = tempfile::tempdir().unwrap();

    spackdev_cmd()
        .current_dir(elsewhere.path())
        .arg("--config")
        .arg(project.path().join("spackdev.toml"))
        .args(["--quiet", "generate", "ci", "--any"])
        .assert()
        .success();

    // Environments live next to the configuration, not the working directory
    assert!(project
        .path()
        .join("dev-envs")
        .join("ci")
        .join("spack.yaml")
        .is_file());
    assert!(!elsewhere.path().join("dev-envs").exists());
}

#[test]
fn test_generate_invalid_name() {
    let project = create_test_project();

    spackdev_cmd()
        .current_dir(project.path())
        .args(["generate", "_private", "--any"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reserved for internal use"));
}

#[test]
fn test_generate_root_conflict() {
    let project = create_test_project();
    fs::create_dir_all(project.path().join("dev-envs")).unwrap();
    fs::write(project.path().join("dev-envs").join("dev"), "").unwrap();

    spackdev_cmd()
        .current_dir(project.path())
        .args(["generate", "dev", "--any"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn test_compiler_before_install() {
    let project = create_test_project();

    spackdev_cmd()
        .current_dir(project.path())
        .args(["generate", "dev", "--any", "--quiet"])
        .assert()
        .success();

    spackdev_cmd()
        .current_dir(project.path())
        .args(["compiler", "dev"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("no compiler recorded in environment 'dev'"));
}

#[test]
fn test_resolve_keeps_node_versions_off_root() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("spackdev.toml"),
        "[[dependency]]\nspec = \"hpctoolkit@2023.08: %gcc @12 ^dyninst @12.3:\"\n",
    )
    .unwrap();

    spackdev_cmd()
        .current_dir(temp_dir.path())
        .args(["resolve", "--minimum"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "hpctoolkit @2023.08 %gcc @12 ^dyninst @12.3:",
        ));
}

#[test]
fn test_missing_config() {
    let temp_dir = tempfile::tempdir().unwrap();

    spackdev_cmd()
        .current_dir(temp_dir.path())
        .args(["resolve", "--any"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("spackdev.toml"))
        .stderr(predicate::str::contains("In CI:").not());
}

#[test]
fn test_ci_hint_on_failure() {
    let temp_dir = tempfile::tempdir().unwrap();

    spackdev_cmd()
        .current_dir(temp_dir.path())
        .env("CI", "true")
        .args(["resolve", "--any"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "In CI: the reused merge-base image is out-of-date. Try updating the branch.",
        ));
}

#[test]
fn test_ci_flag_on_failure() {
    let temp_dir = tempfile::tempdir().unwrap();

    spackdev_cmd()
        .current_dir(temp_dir.path())
        .args(["--ci", "resolve", "--any"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Try updating the branch."));
}

#[test]
fn test_invalid_dependency_reported() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("spackdev.toml"),
        "[[dependency]]\nspec = \"zlib@:1.2\"\n",
    )
    .unwrap();

    spackdev_cmd()
        .current_dir(temp_dir.path())
        .args(["resolve", "--any"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("spec must declare a minimum version"));
}

#[test]
fn test_version_flag() {
    spackdev_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("spackdev"));
}
