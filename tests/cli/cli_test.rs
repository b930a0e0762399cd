//! CLI contract tests.

use std::fs;
use std::path::Path;
use std::process::Output;

use assert_cmd::Command;

use discord_tools::credentials::enforce_private_file_permissions;

use crate::support::{assert_no_connection, bind, captured, serve_once};

fn cli(dir: &tempfile::TempDir) -> Command {
    let mut cmd = match Command::cargo_bin("discord-tools") {
        Ok(cmd) => cmd,
        Err(err) => panic!("binary should build: {err}"),
    };
    cmd.arg("--config")
        .arg(dir.path().join("config.toml"))
        .env("HOME", dir.path())
        .env_remove("DISCORD_BOT_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    match serde_json::from_slice(&output.stdout) {
        Ok(value) => value,
        Err(err) => panic!(
            "stdout should be JSON ({err}): {}",
            String::from_utf8_lossy(&output.stdout)
        ),
    }
}

fn write_config(dir: &tempfile::TempDir, api_base: &str) {
    let config = format!("[discord]\napi_base = \"{api_base}\"\ntimeout_secs = 5\n");
    assert!(fs::write(dir.path().join("config.toml"), config).is_ok());
}

fn write_env_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        assert!(fs::create_dir_all(parent).is_ok());
    }
    assert!(fs::write(path, contents).is_ok());
    assert!(enforce_private_file_permissions(path).is_ok());
}

/// Run the binary off the async runtime so the test server keeps serving.
async fn run(mut cmd: Command) -> Output {
    match tokio::task::spawn_blocking(move || cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => panic!("command should run: {err}"),
        Err(err) => panic!("command task should finish: {err}"),
    }
}

#[test]
fn tools_lists_definitions() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = cli(&dir).arg("tools").output().expect("command should run");

    assert!(output.status.success());
    let defs = stdout_json(&output);
    let names: Vec<&str> = defs
        .as_array()
        .map(|defs| defs.iter().filter_map(|d| d["name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["discord_send_message", "discord_read_history"]);
}

#[test]
fn credentials_lists_discord_spec() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = cli(&dir).arg("credentials").output().expect("command should run");

    assert!(output.status.success());
    let specs = stdout_json(&output);
    assert_eq!(specs[0]["credential_id"], "discord");
    assert_eq!(specs[0]["env_var"], "DISCORD_BOT_TOKEN");
}

#[test]
fn send_with_empty_content_fails_without_token() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = cli(&dir)
        .args(["send", "--channel", "123", "--content", ""])
        .output()
        .expect("command should run");

    assert!(!output.status.success());
    assert_eq!(
        stdout_json(&output),
        serde_json::json!({"error": "Message content cannot be empty"})
    );
}

#[test]
fn history_without_token_reports_configuration_error() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let creds = dir.path().join("credentials.json");
    assert!(fs::write(&creds, "{}").is_ok());

    let output = cli(&dir)
        .arg("--credentials")
        .arg(&creds)
        .args(["history", "--channel", "123", "--limit", "5"])
        .output()
        .expect("command should run");

    assert!(!output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result["error"], "Discord credentials not configured");
    assert_eq!(
        result["help"],
        format!("Add a \"discord\" entry to {}", creds.display())
    );
}

#[test]
fn history_without_any_store_names_the_env_var() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let output = cli(&dir)
        .args(["history", "--channel", "123"])
        .output()
        .expect("command should run");

    assert!(!output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result["help"], "Set DISCORD_BOT_TOKEN environment variable");
}

#[tokio::test(flavor = "multi_thread")]
async fn send_reads_token_from_env_file() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (base, server) = serve_once("200 OK", r#"{"id":"77","content":"hi"}"#).await;
    write_config(&dir, &base);
    let env_path = dir.path().join("bot.env");
    write_env_file(&env_path, "DISCORD_BOT_TOKEN=file-token\n");

    let mut cmd = cli(&dir);
    cmd.arg("--env-file")
        .arg(&env_path)
        .args(["send", "--channel", "55", "--content", "hi"]);
    let output = run(cmd).await;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        stdout_json(&output),
        serde_json::json!({"success": true, "data": {"id": "77", "content": "hi"}})
    );

    let request = captured(server).await;
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/channels/55/messages");
    assert_eq!(request.header("authorization"), Some("Bot file-token"));
}

#[tokio::test(flavor = "multi_thread")]
async fn credentials_file_takes_precedence_over_env_file() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (base, server) = serve_once("200 OK", "[]").await;
    write_config(&dir, &base);
    let env_path = dir.path().join("bot.env");
    write_env_file(&env_path, "DISCORD_BOT_TOKEN=file-token\n");
    let creds = dir.path().join("credentials.json");
    assert!(fs::write(&creds, r#"{"discord": "json-token"}"#).is_ok());

    let mut cmd = cli(&dir);
    cmd.arg("--credentials")
        .arg(&creds)
        .arg("--env-file")
        .arg(&env_path)
        .args(["history", "--channel", "9", "--limit", "3"]);
    let output = run(cmd).await;

    assert!(output.status.success());
    let request = captured(server).await;
    assert_eq!(request.target, "/channels/9/messages?limit=3");
    assert_eq!(request.header("authorization"), Some("Bot json-token"));
}

#[tokio::test(flavor = "multi_thread")]
async fn default_env_file_without_key_does_not_fall_back_to_environment() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (listener, base) = bind().await;
    write_config(&dir, &base);
    let env_path = dir.path().join(".discord-tools").join(".env");
    write_env_file(&env_path, "OTHER_TOKEN=abc\n");

    let mut cmd = cli(&dir);
    cmd.env("DISCORD_BOT_TOKEN", "process-token")
        .args(["history", "--channel", "1"]);
    let output = run(cmd).await;

    assert!(!output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result["error"], "Discord credentials not configured");
    assert_eq!(
        result["help"],
        format!("Set DISCORD_BOT_TOKEN in {}", env_path.display())
    );
    assert_no_connection(listener).await;
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    assert!(fs::write(dir.path().join("config.toml"), "[discord]\napi_base = \"nope\"\n").is_ok());

    let output = cli(&dir).arg("tools").output().expect("command should run");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("config.toml"));
}
