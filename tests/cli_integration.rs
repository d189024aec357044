//! CLI integration tests.
//!
//! These tests run the `strata` binary against temporary workspaces.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// A temporary workspace with an isolated environment.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// A `strata` command rooted in this workspace, acting as Ann.
    fn strata(&self) -> Command {
        let mut cmd = Command::cargo_bin("strata").unwrap();
        cmd.current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("xdg"))
            .env_remove("STRATA_CONFIG")
            .env_remove("STRATA_LOG")
            .env("STRATA_AUTHOR_NAME", "Ann")
            .env("STRATA_AUTHOR_EMAIL", "ann@example.com");
        cmd
    }

    fn snapshot(&self, name: &str, json: &str) -> std::path::PathBuf {
        let file = self.dir.child(name);
        file.write_str(json).unwrap();
        file.path().to_path_buf()
    }

    fn init(&self) {
        self.strata()
            .args(["init", "--name", "HQ"])
            .assert()
            .success();
    }

    fn commit(&self, branch: &str, json: &str, message: &str) {
        let file = self.snapshot(&format!("{message}.json"), json);
        self.strata()
            .args(["commit", "--branch", branch, "-m", message, "--file"])
            .arg(file)
            .assert()
            .success();
    }
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("strata")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("strata"));
}

#[test]
fn commands_need_an_initialized_workspace() {
    let ws = Workspace::new();
    ws.strata()
        .args(["branch", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("strata init"));
}

#[test]
fn init_creates_store_document() {
    let ws = Workspace::new();
    ws.strata()
        .args(["init", "--name", "HQ"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized repository 'HQ'"));
    ws.dir
        .child(".strata/store.json")
        .assert(predicate::str::contains("strata.store"));

    ws.strata()
        .args(["init", "--name", "HQ"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn branch_commit_merge_flow() {
    let ws = Workspace::new();
    ws.init();
    ws.commit("main", r#"{"equipment/AHU-1": {"kw": 10}}"#, "survey");

    ws.strata()
        .args(["branch", "create", "upgrade"])
        .assert()
        .success();
    ws.commit("upgrade", r#"{"equipment/AHU-1": {"kw": 12}}"#, "bigger-fan");

    ws.strata()
        .args(["status", "upgrade"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 commit(s) ahead"));

    ws.strata()
        .args(["diff", "main", "upgrade"])
        .assert()
        .success()
        .stdout(predicate::str::contains("~ equipment/AHU-1.kw: 10 -> 12"))
        .stdout(predicate::str::contains("0 added, 0 removed, 1 modified"));

    ws.strata()
        .args(["merge", "upgrade"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fast-forwarded 'main' to 'upgrade'"));

    ws.strata()
        .args(["log", "--branch", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bigger-fan"))
        .stdout(predicate::str::contains("survey"));

    ws.strata().arg("verify").assert().success();
}

#[test]
fn protected_target_needs_permission() {
    let ws = Workspace::new();
    ws.strata()
        .args(["init", "--name", "HQ", "--protected"])
        .assert()
        .success();
    ws.commit("main", r#"{"rooms/101": {"area": 40}}"#, "base");
    ws.strata()
        .args(["branch", "create", "work"])
        .assert()
        .success();
    ws.commit("work", r#"{"rooms/101": {"area": 42}}"#, "remeasure");

    ws.strata()
        .args(["merge", "work"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("forbidden"));

    ws.strata()
        .args(["merge", "work", "--allow-protected"])
        .assert()
        .success();
}

#[test]
fn pull_request_flow() {
    let ws = Workspace::new();
    ws.init();
    ws.commit("main", r#"{"rooms/101": {"area": 40}}"#, "base");
    ws.strata()
        .args(["branch", "create", "feature/remeasure"])
        .assert()
        .success();
    ws.commit("feature/remeasure", r#"{"rooms/101": {"area": 42}}"#, "remeasure");

    ws.strata()
        .args(["pr", "open", "feature/remeasure", "--title", "Remeasure 101"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#1 [open] Remeasure 101"));

    ws.strata()
        .args(["pr", "comment", "1", "Checked on site"])
        .env("STRATA_AUTHOR_NAME", "Bob")
        .env("STRATA_AUTHOR_EMAIL", "bob@example.com")
        .assert()
        .success();

    ws.strata()
        .args(["pr", "approve", "1"])
        .env("STRATA_AUTHOR_NAME", "Bob")
        .env("STRATA_AUTHOR_EMAIL", "bob@example.com")
        .assert()
        .success()
        .stdout(predicate::str::contains("[approved]"));

    ws.strata()
        .args(["pr", "merge", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[merged]"));

    ws.strata()
        .args(["pr", "close", "1"])
        .assert()
        .code(4);

    ws.strata()
        .args(["pr", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked on site"))
        .stdout(predicate::str::contains("Approved by Bob <bob@example.com>"));
}

#[test]
fn pr_list_filters_by_priority() {
    let ws = Workspace::new();
    ws.init();
    ws.commit("main", r#"{"rooms/105": {"outlets": 4}}"#, "base");
    for name in ["fix/outlet", "paint"] {
        ws.strata()
            .args(["branch", "create", name])
            .assert()
            .success();
    }
    ws.strata()
        .args(["pr", "open", "fix/outlet", "-t", "Broken outlet"])
        .args(["--priority", "urgent", "--type", "work_order"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[open, urgent, work_order]"));
    ws.strata()
        .args(["pr", "open", "paint", "-t", "Repaint lobby"])
        .assert()
        .success();

    ws.strata()
        .args(["pr", "list", "--priority", "urgent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Broken outlet"))
        .stdout(predicate::str::contains("Repaint lobby").not());
}

#[test]
fn json_output_is_parseable() {
    let ws = Workspace::new();
    ws.init();
    ws.commit("main", r#"{"rooms/101": {"area": 40}}"#, "base");

    let output = ws
        .strata()
        .args(["branch", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let branches: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(branches[0]["name"], "main");
    assert_eq!(branches[0]["is_default"], true);
}

#[test]
fn commit_requires_identity() {
    let ws = Workspace::new();
    ws.init();
    let file = ws.snapshot("s.json", r#"{"rooms/1": {}}"#);
    ws.strata()
        .env_remove("STRATA_AUTHOR_NAME")
        .args(["commit", "-m", "x", "--file"])
        .arg(file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Author identity required"));
}

#[test]
fn invalid_project_config_is_rejected() {
    let ws = Workspace::new();
    ws.dir
        .child(".strata/config.toml")
        .write_str("[commits]\nshort_hash_len = 2\n")
        .unwrap();
    ws.strata()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("short_hash_len"));
}

#[test]
fn config_show_reports_defaults() {
    let ws = Workspace::new();
    ws.strata()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("commits.short_hash_len = 7"))
        .stdout(predicate::str::contains("review.required_approvals = 1"));
}

#[test]
fn completion_generates_script() {
    Command::cargo_bin("strata")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strata"));
}
