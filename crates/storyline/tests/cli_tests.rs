//! CLI integration tests.
//!
//! These tests exercise the CLI commands end-to-end against a temporary
//! library directory.

use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn storyline(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_storyline"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("STORYLINE_CONFIG_CONTENT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn invoke(data_dir: &Path, command: &str, payload: &str) -> (bool, Value) {
    let output = storyline(data_dir, &["invoke", command, payload]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout}"));
    (output.status.success(), value)
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyline"))
        .arg("version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("storyline"));
}

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyline"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Story versioning and variation engine"));
    assert!(stdout.contains("--data-dir"));
    assert!(stdout.contains("invoke"));
}

#[test]
fn test_commands_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_storyline"))
        .arg("commands")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let names: Vec<&str> = stdout.lines().collect();
    assert!(names.contains(&"create_story_version"));
    assert!(names.contains(&"git_merge_branches"));
    assert!(names.contains(&"git_abort_merge"));
}

#[test]
fn test_invoke_story_lifecycle() {
    let dir = TempDir::new().unwrap();

    let (ok, story) = invoke(dir.path(), "create_story", r#"{"title": "Harbor"}"#);
    assert!(ok);
    let story_id = story["id"].as_str().unwrap().to_string();

    let payload = format!(r#"{{"repoPath": "{story_id}", "name": "What if Sarah lived?"}}"#);
    let (ok, branch) = invoke(dir.path(), "git_create_branch", &payload);
    assert!(ok);
    assert_eq!(branch["slug"], "what-if-sarah-lived");

    // A second process sees the same library
    let payload = format!(r#"{{"storyId": "{story_id}"}}"#);
    let (ok, versions) = invoke(dir.path(), "list_story_versions", &payload);
    assert!(ok);
    let versions = versions.as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["isOriginal"], true);

    let output = storyline(dir.path(), &["show", &story_id]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("* original"));
    assert!(stdout.contains("what-if-sarah-lived"));
}

#[test]
fn test_invoke_errors_are_json() {
    let dir = TempDir::new().unwrap();

    let (ok, story) = invoke(dir.path(), "create_story", r#"{"title": "Errors"}"#);
    assert!(ok);
    let story_id = story["id"].as_str().unwrap().to_string();

    let payload = format!(r#"{{"repoPath": "{story_id}", "name": "HEAD"}}"#);
    let (ok, err) = invoke(dir.path(), "git_create_branch", &payload);
    assert!(!ok);
    assert_eq!(err["kind"], "invalid_argument");

    let (ok, err) = invoke(dir.path(), "no_such_command", "{}");
    assert!(!ok);
    assert_eq!(err["kind"], "unknown_command");

    let (ok, err) = invoke(dir.path(), "get_story", "{not json");
    assert!(!ok);
    assert_eq!(err["kind"], "invalid_payload");

    let (ok, err) = invoke(dir.path(), "get_story", r#"{"storyId": "sty_missing"}"#);
    assert!(!ok);
    assert_eq!(err["kind"], "not_found");
}

#[test]
fn test_conflicted_merge_across_invocations() {
    let dir = TempDir::new().unwrap();

    let (ok, story) = invoke(
        dir.path(),
        "create_story",
        r#"{"title": "Forked Road", "content": "start"}"#,
    );
    assert!(ok);
    let story_id = story["id"].as_str().unwrap().to_string();
    let original_id = story["activeVersionId"].as_str().unwrap().to_string();

    let payload = json!({"repoPath": story_id, "name": "Fork"}).to_string();
    let (ok, branch) = invoke(dir.path(), "git_create_branch", &payload);
    assert!(ok);
    let fork_id = branch["versionId"].as_str().unwrap().to_string();

    for (version_id, content) in [(&fork_id, "fork ending"), (&original_id, "main ending")] {
        let payload = json!({"versionId": version_id, "content": content}).to_string();
        let (ok, _) = invoke(dir.path(), "create_story_snapshot", &payload);
        assert!(ok);
    }

    let payload =
        json!({"repoPath": story_id, "fromBranch": "fork", "intoBranch": "original"}).to_string();
    let (ok, result) = invoke(dir.path(), "git_merge_branches", &payload);
    assert!(ok);
    assert_eq!(result["state"], "conflict_pending");
    assert_eq!(result["conflicts"], json!(["story"]));

    // Each step below runs in a new process
    let repo = json!({"repoPath": story_id}).to_string();
    let (ok, status) = invoke(dir.path(), "git_merge_status", &repo);
    assert!(ok);
    assert_eq!(status["fromSlug"], "fork");
    assert_eq!(status["intoSlug"], "original");

    let payload = json!({"repoPath": story_id, "filePath": "story", "takeTheirs": true}).to_string();
    let (ok, _) = invoke(dir.path(), "git_resolve_conflict", &payload);
    assert!(ok);

    let (ok, result) = invoke(dir.path(), "git_commit_all", &repo);
    assert!(ok);
    assert_eq!(result["state"], "committed");

    let (ok, status) = invoke(dir.path(), "git_merge_status", &repo);
    assert!(ok);
    assert!(status.is_null());

    let payload = json!({"versionId": original_id}).to_string();
    let (ok, snapshots) = invoke(dir.path(), "list_story_snapshots", &payload);
    assert!(ok);
    assert_eq!(snapshots[0]["content"], "fork ending");
    assert_eq!(snapshots[0]["label"], "merge from fork");
}

#[test]
fn test_library_config_is_applied() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("storyline.jsonc"),
        r#"{
            // keep a short history
            "versioning": { "maxSnapshotsPerVersion": 3 }
        }"#,
    )
    .unwrap();

    let output = storyline(dir.path(), &["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("storyline.jsonc"));
    assert!(stdout.contains(r#""maxSnapshotsPerVersion": 3"#));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("storyline.json"),
        r#"{"versioning": {"maxSnapshotsPerVersion": 1}}"#,
    )
    .unwrap();

    let output = storyline(dir.path(), &["stories"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config"));
}
