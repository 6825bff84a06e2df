//! CLI end-to-end tests
//!
//! Tests for the audioforge command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the audioforge binary
#[allow(deprecated)]
fn audioforge_cmd() -> Command {
    let mut cmd = Command::cargo_bin("audioforge").unwrap();
    cmd.env_remove("PORT").env_remove("AUDIOFORGE_DAILY_LIMIT");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    audioforge_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    audioforge_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("audioforge"))
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("quota"));
}

#[test]
fn test_cli_version_command() {
    audioforge_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    audioforge_cmd()
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"));
}

#[test]
fn test_cli_validate_valid_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        r#"
[server]
port = 8099

[quota]
daily_limit = 5
"#,
    )
    .unwrap();

    audioforge_cmd()
        .arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Daily limit: 5"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "[quota]\ndaily_limit = 0\n").unwrap();

    audioforge_cmd().arg("validate").arg(&config).assert().failure();
}

#[test]
fn test_cli_quota_command() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("count.json");
    fs::write(
        &state,
        r#"{"count":2,"lastResetDate":"2026-03-01T00:00:00Z"}"#,
    )
    .unwrap();

    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!("[quota]\nstate_file = {:?}\n", state.to_string_lossy()),
    )
    .unwrap();

    audioforge_cmd()
        .arg("--config")
        .arg(&config)
        .arg("quota")
        .assert()
        .success()
        .stdout(predicate::str::contains("Conversions: 2 / 3"));
}

#[test]
fn test_cli_convert_missing_input() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "").unwrap();

    audioforge_cmd()
        .arg("--config")
        .arg(&config)
        .arg("convert")
        .arg(dir.path().join("missing.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_convert_refuses_to_overwrite_input() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "").unwrap();
    let input = dir.path().join("song.mp3");
    fs::write(&input, b"ID3original").unwrap();

    audioforge_cmd()
        .arg("--config")
        .arg(&config)
        .arg("convert")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("overwrite"));

    audioforge_cmd()
        .arg("--config")
        .arg(&config)
        .arg("convert")
        .arg(&input)
        .arg("--output")
        .arg(dir.path().join(".").join("song.mp3"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("overwrite"));

    assert_eq!(fs::read(&input).unwrap(), b"ID3original");
}
