//! Integration tests for the pkgshift CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Test helper to get the CLI binary
fn pkgshift_cmd() -> Command {
    Command::cargo_bin("pkgshift").unwrap()
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small module: alpha/widget.go is used by cmd/shop/main.go.
fn sample_module() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "go.mod", "module example.com/shop\n\ngo 1.21\n");
    write(
        root,
        "alpha/widget.go",
        "package alpha\n\ntype Widget struct{}\n\nfunc NewWidget() *Widget { return &Widget{} }\n\nfunc helper() int { return 1 }\n",
    );
    write(root, "alpha/user.go", "package alpha\n\nvar Count = helper()\n");
    write(
        root,
        "cmd/shop/main.go",
        "package main\n\nimport \"example.com/shop/alpha\"\n\nfunc main() { _ = alpha.NewWidget() }\n",
    );
    dir
}

#[test]
fn test_version_flag() {
    pkgshift_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_lists_subcommands() {
    pkgshift_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("move"))
        .stdout(predicate::str::contains("expose"))
        .stdout(predicate::str::contains("print-default-config"));
}

#[test]
fn test_print_default_config() {
    pkgshift_cmd()
        .arg("print-default-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("qualifier_deletion: textual"))
        .stdout(predicate::str::contains("build_tags"));
}

#[test]
fn test_validate_config() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.yml");
    fs::write(&good, "rename:\n  add_prefix: Legacy\nperformance:\n  max_workers: 2\n").unwrap();
    pkgshift_cmd()
        .arg("validate-config")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("Legacy"));

    let bad = dir.path().join("bad.yml");
    fs::write(&bad, "performance:\n  max_workers: 0\n").unwrap();
    pkgshift_cmd()
        .arg("validate-config")
        .arg(&bad)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_move_with_json_report() {
    let module = sample_module();
    let output = pkgshift_cmd()
        .args(["move", "--file", "alpha/widget.go", "--new", "beta", "--output", "beta", "--json"])
        .arg("--workdir")
        .arg(module.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let reports: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let report = &reports[0];
    assert_eq!(report["moved_symbols"], serde_json::json!(["NewWidget", "Widget"]));
    assert_eq!(report["destination_namespace"]["name"], "beta");
    assert_eq!(report["origin_removed"], true);
    assert_eq!(report["warnings"][0]["kind"], "unexported_reference");

    let main = fs::read_to_string(module.path().join("cmd/shop/main.go")).unwrap();
    assert!(main.contains("import \"example.com/shop/beta\""));
    assert!(main.contains("beta.NewWidget()"));
    assert!(module.path().join("beta/widget.go").is_file());
}

#[test]
fn test_move_reads_files_from_stdin() {
    let module = sample_module();
    pkgshift_cmd()
        .args(["move", "--file", "-", "--new", "beta", "--output", "beta"])
        .arg("--workdir")
        .arg(module.path())
        .write_stdin("\nalpha/widget.go\n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved"));

    assert!(!module.path().join("alpha/widget.go").exists());
}

#[test]
fn test_move_missing_target_fails() {
    let module = sample_module();
    pkgshift_cmd()
        .args(["move", "--file", "alpha/nope.go", "--new", "beta"])
        .arg("--workdir")
        .arg(module.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nope.go"));
}

#[test]
fn test_move_rejects_invalid_prefix() {
    let module = sample_module();
    pkgshift_cmd()
        .args(["move", "--file", "alpha/widget.go", "--new", "beta", "--add-prefix", "bad-prefix"])
        .arg("--workdir")
        .arg(module.path())
        .assert()
        .failure()
        .code(1);

    assert!(module.path().join("alpha/widget.go").exists());
}

#[test]
fn test_expose_prints_rename_commands() {
    let module = sample_module();
    pkgshift_cmd()
        .args(["expose", "--file", "alpha/widget.go"])
        .arg("--workdir")
        .arg(module.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("gopls rename -w"))
        .stdout(predicate::str::contains("widget.go:7:6 Helper"));
}
