//! Integration tests: CLI smoke tests against the built `osg` binary.

mod common;

use std::fs;
use std::path::Path;

use serde_json::Value;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let state = dir.join("state");
    let path = dir.join("config.toml");
    fs::write(
        &path,
        format!(
            r#"
[watch]
mount_point = "{mount}"

[relocation]
destination_root = "{dest}"
sources = [{{ path = "{music}", name = "Music" }}]

[cleanup]
targets = [{{ path = "{cache}" }}]
log_dirs = []

[paths]
lock_file = "{state}/watch.pid"
alert_state_file = "{state}/alert-state"
jsonl_log = "{state}/activity.jsonl"

[notifications]
enabled = false
"#,
            mount = dir.display(),
            dest = dir.join("dest").display(),
            music = dir.join("Music").display(),
            cache = dir.join("cache").display(),
            state = state.display(),
        ),
    )
    .expect("write config");
    path
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: osg [OPTIONS] [COMMAND]"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
    for sub in ["gui", "status", "clean", "move", "watch"] {
        assert!(
            result.stdout.contains(sub),
            "help is missing {sub}; log: {}",
            result.log_path.display()
        );
    }
}

#[test]
fn help_subcommand_prints_usage() {
    let result = common::run_cli_case("help_subcommand_prints_usage", &["help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(result.stdout.contains("Usage: osg"));
}

#[test]
fn unknown_command_prints_usage_and_fails() {
    let result = common::run_cli_case("unknown_command_prints_usage_and_fails", &["defrag"]);
    assert!(
        !result.status.success(),
        "expected failure; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("Usage: osg"),
        "missing usage on stderr; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(result.status.success());
    assert!(
        result.stdout.contains(env!("CARGO_PKG_VERSION")),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn status_json_reports_usage_of_configured_mount() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = write_config(tmp.path());
    let result = common::run_cli_case_in(
        "status_json_reports_usage_of_configured_mount",
        tmp.path(),
        &["--config", config.to_str().expect("utf-8 path"), "--json", "status"],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );

    let line = result.stdout.lines().next().expect("one JSON line");
    let payload: Value = serde_json::from_str(line).expect("valid JSON");
    assert_eq!(payload["command"], "status");
    let status = &payload["status"];
    assert!(status["total_bytes"].as_u64().is_some_and(|b| b > 0));
    let severity = status["severity"].as_str().expect("severity label");
    assert!(["OK", "WARNING", "CRITICAL", "UNKNOWN"].contains(&severity));
}

#[test]
fn status_human_shows_tier_line() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = write_config(tmp.path());
    let result = common::run_cli_case_in(
        "status_human_shows_tier_line",
        tmp.path(),
        &["--config", config.to_str().expect("utf-8 path"), "--no-color", "status"],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(result.stdout.contains("Filesystem"));
    assert!(result.stdout.contains("Status: "));
}

#[test]
fn missing_explicit_config_is_user_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let missing = tmp.path().join("nope.toml");
    let result = common::run_cli_case_in(
        "missing_explicit_config_is_user_error",
        tmp.path(),
        &["--config", missing.to_str().expect("utf-8 path"), "status"],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("OSG-1002"));
}

#[test]
fn clean_and_move_refuse_without_root() {
    if common::running_as_root() {
        return;
    }
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = write_config(tmp.path());
    fs::create_dir_all(tmp.path().join("Music")).expect("create source");
    fs::create_dir_all(tmp.path().join("cache").join("junk")).expect("create cache");

    for (case, args) in [
        ("clean_refuses_without_root", vec!["clean"]),
        ("move_refuses_without_root", vec!["move"]),
    ] {
        let mut full = vec!["--config", config.to_str().expect("utf-8 path")];
        full.extend(args);
        let result = common::run_cli_case_in(case, tmp.path(), &full);
        assert_eq!(result.status.code(), Some(2), "log: {}", result.log_path.display());
        assert!(
            result.stderr.contains("OSG-3001"),
            "missing privilege error; log: {}",
            result.log_path.display()
        );
    }

    assert!(tmp.path().join("Music").is_dir());
    assert!(!tmp.path().join("Music").is_symlink());
    assert!(tmp.path().join("cache").join("junk").is_dir());
}

#[test]
fn completions_generate_for_bash() {
    let result = common::run_cli_case("completions_generate_for_bash", &["completions", "bash"]);
    assert!(result.status.success());
    assert!(result.stdout.contains("osg"));
}
