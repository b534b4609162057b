//! End-to-end tests that run the compiled `drift` binary.

use assert_cmd::Command;
use drift_test_utils::TestTree;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `drift` command bound to an isolated state directory, colors off.
fn drift(state: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("drift").expect("Failed to find drift binary");
    cmd.env("DRIFT_STATE_DIR", state.path())
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("RUST_LOG");
    cmd
}

fn register(state: &TempDir, name: &str, tree: &TestTree) {
    drift(state)
        .args(["register", name])
        .arg(tree.root())
        .assert()
        .success();
}

#[test]
fn help_lists_commands() {
    let state = TempDir::new().unwrap();
    drift(&state)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("purge"));
}

#[test]
fn no_command_prints_hint() {
    let state = TempDir::new().unwrap();
    drift(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("drift --help"));
}

#[test]
fn register_and_list() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    register(&state, "conf", &tree);

    drift(&state)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("conf"))
        .stdout(predicate::str::contains("not scanned"));

    assert!(state.path().join("directories.toml").exists());
}

#[test]
fn duplicate_register_fails() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    register(&state, "conf", &tree);

    drift(&state)
        .args(["register", "conf"])
        .arg(tree.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));
}

#[test]
fn scan_reports_drift_across_runs() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("server.xml", "<server/>");
    tree.write("logging.properties", "level=INFO");
    register(&state, "conf", &tree);

    drift(&state)
        .args(["scan", "conf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("version 1 (COVERAGE)"))
        .stdout(predicate::str::contains("+ server.xml"));

    tree.write("server.xml", "<server port=\"8443\"/>");
    tree.remove("logging.properties");
    tree.write("context.xml", "<context/>");

    drift(&state)
        .args(["scan", "conf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("version 2 (DRIFT)"))
        .stdout(predicate::str::contains("+ context.xml"))
        .stdout(predicate::str::contains("~ server.xml"))
        .stdout(predicate::str::contains("- logging.properties"));

    drift(&state)
        .args(["diff", "conf", "--from", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("~ server.xml"));

    drift(&state)
        .args(["history", "conf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("COVERAGE"))
        .stdout(predicate::str::contains("DRIFT"));
}

#[test]
fn unchanged_tree_reports_no_drift() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "1");
    register(&state, "conf", &tree);
    drift(&state).args(["scan", "conf"]).assert().success();
    drift(&state).args(["scan", "conf"]).assert().success();

    drift(&state)
        .args(["diff", "conf", "--from", "1", "--to", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No drift."));
}

#[test]
fn scan_json_is_machine_readable() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "1");
    tree.write("b.conf", "2");
    register(&state, "conf", &tree);

    let output = drift(&state).args(["scan", "conf", "--json"]).output().unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["name"], "conf");
    assert_eq!(summary["version"], 1);
    assert_eq!(summary["category"], "COVERAGE");
    assert_eq!(summary["counts"]["added"], 2);
}

#[test]
fn filters_limit_what_is_tracked() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("server.xml", "<server/>");
    tree.write("notes.txt", "todo");
    tree.write("tmp/cache.xml", "<cache/>");

    drift(&state)
        .args(["register", "conf"])
        .arg(tree.root())
        .args(["-i", "*.xml", "-e", "tmp:"])
        .assert()
        .success();

    let output = drift(&state).args(["diff", "conf", "--json"]).output().unwrap();
    assert!(!output.status.success());

    drift(&state).args(["scan", "conf"]).assert().success();
    let output = drift(&state).args(["diff", "conf", "--json"]).output().unwrap();
    assert!(output.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let paths: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["server.xml"]);
}

#[test]
fn export_prints_agent_format() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "abc");
    drift(&state)
        .args(["register", "conf"])
        .arg(tree.root())
        .args(["--resource", "web-01"])
        .assert()
        .success();
    drift(&state).args(["scan", "conf"]).assert().success();

    drift(&state)
        .args(["export", "conf"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("web-01\n"))
        .stdout(predicate::str::contains(
            "A sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad 0 3 0 a.conf",
        ));
}

#[test]
fn purge_then_unregister() {
    let state = TempDir::new().unwrap();
    let tree = TestTree::new();
    tree.write("a.conf", "1");
    register(&state, "conf", &tree);
    drift(&state).args(["scan", "conf"]).assert().success();

    drift(&state)
        .args(["unregister", "conf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("drift purge conf --through 1"));

    drift(&state)
        .args(["purge", "conf", "--through", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no versions remain"));

    drift(&state).args(["unregister", "conf"]).assert().success();
    drift(&state)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No monitored directories"));
}

#[test]
fn compare_two_directories() {
    let state = TempDir::new().unwrap();
    let left = TestTree::new();
    left.write("server.xml", "<server/>");
    left.write("only-left.conf", "1");
    let right = TestTree::new();
    right.write("server.xml", "<server port=\"1\"/>");
    register(&state, "left", &left);
    register(&state, "right", &right);
    drift(&state).args(["scan", "--all"]).assert().success();

    drift(&state)
        .args(["compare", "left", "right@1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("only-left.conf (only in left@1)"))
        .stdout(predicate::str::contains("server.xml (differs)"));
}

#[test]
fn unknown_directory_is_an_error() {
    let state = TempDir::new().unwrap();
    drift(&state)
        .args(["scan", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("missing"));
}
