#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn unfollow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("unfollow").unwrap();
    cmd.current_dir(dir.path())
        .env("UNFOLLOW_HOME", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_home(dir: &TempDir) {
    unfollow(dir).args(["config", "init"]).assert().success();
}

const FOLLOWING: &str = r#"{
  "relationships_following": [
    {"title": "alice", "string_list_data": [{"href": "https://www.instagram.com/_u/alice", "timestamp": 1700000300}]},
    {"title": "bob", "string_list_data": [{"href": "https://www.instagram.com/_u/bob", "timestamp": 1700000200}]},
    {"title": "carol", "string_list_data": [{"href": "https://www.instagram.com/_u/carol", "timestamp": 1700000100}]}
  ]
}"#;

const FOLLOWERS: &str = r#"[
  {"title": "", "string_list_data": [{"href": "https://www.instagram.com/bob", "value": "bob", "timestamp": 1700000000}]}
]"#;

fn write_export(dir: &TempDir, followers: &str) -> PathBuf {
    let path = dir.path().join("export.zip");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    for (name, body) in [
        ("connections/followers_and_following/following.json", FOLLOWING),
        ("connections/followers_and_following/followers_1.json", followers),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

fn set_config(home: &Path, from: &str, to: &str) {
    let path = home.join("config.yaml");
    let body = std::fs::read_to_string(&path).unwrap();
    assert!(body.contains(from), "config has no {from}");
    std::fs::write(&path, body.replace(from, to)).unwrap();
}

// ---------------------------------------------------------------------------
// unfollow config
// ---------------------------------------------------------------------------

#[test]
fn config_init_writes_defaults() {
    let dir = TempDir::new().unwrap();
    unfollow(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let body = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(body.contains("hourly_quota: 50"));
    assert!(body.contains("window_seconds: 3600"));
    assert!(dir.path().join("chrome-profile").is_dir());
}

#[test]
fn config_init_is_idempotent_unless_forced() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    set_config(dir.path(), "hourly_quota: 50", "hourly_quota: 20");

    unfollow(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
    let body = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(body.contains("hourly_quota: 20"));

    unfollow(&dir)
        .args(["config", "init", "--force"])
        .assert()
        .success();
    let body = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(body.contains("hourly_quota: 50"));
}

#[test]
fn config_show_json() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    let cfg = stdout_json(unfollow(&dir).args(["config", "show", "--json"]));
    assert_eq!(cfg["limits"]["hourly_quota"], 50);
    assert_eq!(cfg["verification"]["unknown_after_action"], "error");
}

#[test]
fn config_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    unfollow(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));

    set_config(dir.path(), "hourly_quota: 50", "hourly_quota: 0");
    unfollow(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] limits.hourly_quota"));
}

#[test]
fn commands_require_initialized_home() {
    let dir = TempDir::new().unwrap();
    unfollow(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// unfollow import / list / stats
// ---------------------------------------------------------------------------

#[test]
fn import_then_list_candidates() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    let archive = write_export(&dir, FOLLOWERS);

    let summary = stdout_json(unfollow(&dir).arg("import").arg(&archive).arg("--json"));
    assert_eq!(summary["following"], 3);
    assert_eq!(summary["followers"], 1);
    assert_eq!(summary["follower_files"], 1);
    assert_eq!(summary["candidates"], 2);

    let listed = stdout_json(unfollow(&dir).args(["list", "--json"]));
    let names: Vec<&str> = listed["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "carol"]);
    assert_eq!(listed["unfollowed"], 0);

    unfollow(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("Already unfollowed: 0"));
}

#[test]
fn reimport_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    let archive = write_export(&dir, FOLLOWERS);
    unfollow(&dir).arg("import").arg(&archive).assert().success();
    let summary = stdout_json(unfollow(&dir).arg("import").arg(&archive).arg("--json"));
    assert_eq!(summary["candidates"], 2);
}

#[test]
fn import_missing_archive_fails() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    unfollow(&dir)
        .args(["import", "nope.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn stats_on_fresh_store() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    let archive = write_export(&dir, FOLLOWERS);
    unfollow(&dir).arg("import").arg(&archive).assert().success();

    let stats = stdout_json(unfollow(&dir).args(["stats", "--json"]));
    assert_eq!(stats["following"], 3);
    assert_eq!(stats["followers"], 1);
    assert_eq!(stats["candidates"], 2);
    assert_eq!(stats["quota"], 50);
    assert_eq!(stats["used_in_window"], 0);
    assert_eq!(stats["remaining"], 50);
    assert_eq!(stats["next_slot_seconds"], 0);
}

// ---------------------------------------------------------------------------
// unfollow run
// ---------------------------------------------------------------------------

#[test]
fn run_without_candidates_finishes_immediately() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    // Everyone followed also follows back.
    let everyone = r#"[
      {"string_list_data": [{"value": "alice", "timestamp": 1}]},
      {"string_list_data": [{"value": "bob", "timestamp": 1}]},
      {"string_list_data": [{"value": "carol", "timestamp": 1}]}
    ]"#;
    let archive = write_export(&dir, everyone);

    let report = stdout_json(
        unfollow(&dir)
            .arg("run")
            .arg("--import")
            .arg(&archive)
            .arg("--json"),
    );
    assert_eq!(report["end"], "done");
    assert_eq!(report["batches"], 0);
    assert_eq!(report["totals"]["unfollowed"], 0);
}

#[test]
fn run_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    init_home(&dir);
    set_config(dir.path(), "hourly_quota: 50", "hourly_quota: 0");
    unfollow(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
