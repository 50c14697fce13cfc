//! Integration tests for the `pawtrack` CLI binary.
//!
//! Parsing, help, completions and offline commands run without a backend.
//! Backend-bound commands run against a wiremock server via `--api-url`.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `pawtrack` binary with env isolation.
///
/// Clears all `PAWTRACK_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn pawtrack_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pawtrack");
    cmd.env("HOME", "/tmp/pawtrack-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/pawtrack-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("PAWTRACK_PROFILE")
        .env_remove("PAWTRACK_API_URL")
        .env_remove("PAWTRACK_PUSH_URL")
        .env_remove("PAWTRACK_TOKEN")
        .env_remove("PAWTRACK_OUTPUT")
        .env_remove("PAWTRACK_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Run a backend-bound command against `server` off the async runtime.
async fn run_against(server: &MockServer, args: &[&str]) -> std::process::Output {
    let uri = server.uri();
    let args: Vec<String> = args.iter().map(|s| (*s).to_owned()).collect();
    tokio::task::spawn_blocking(move || {
        pawtrack_cmd()
            .args(["--api-url", uri.as_str(), "--token", "test-token"])
            .args(&args)
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = pawtrack_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_flag() {
    pawtrack_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("watch")
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("geofence")),
    );
}

#[test]
fn test_version_flag() {
    pawtrack_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pawtrack"));
}

#[test]
fn test_invalid_subcommand() {
    pawtrack_cmd()
        .arg("teleport")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_zsh() {
    pawtrack_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    pawtrack_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Offline commands ────────────────────────────────────────────────

#[test]
fn test_geofence_inside_default_home() {
    let output = pawtrack_cmd()
        .args(["-o", "json", "geofence", "6.2505", "-75.5905"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["inside"], json!(["Home"]));
    assert!(report["distances"][0]["distance_m"].as_f64().unwrap() < 100.0);
}

#[test]
fn test_geofence_rejects_out_of_range_latitude() {
    pawtrack_cmd()
        .args(["geofence", "95", "10"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_status_without_config_fails() {
    let output = pawtrack_cmd().args(["status", "P1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("config init"));
}

#[test]
fn test_api_url_without_token_is_auth_error() {
    pawtrack_cmd()
        .args(["--api-url", "http://127.0.0.1:9", "pets", "list"])
        .assert()
        .failure()
        .code(3);
}

// ── Backend-bound commands ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_pets_list_json() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/pets",
        json!([
            { "id": "P1", "name": "Luna", "species": "dog", "collarId": "D1" },
            { "id": "P2", "name": "Milo", "species": "cat" }
        ]),
    )
    .await;

    let output = run_against(&server, &["-o", "json", "pets", "list"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let pets: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(pets.as_array().unwrap().len(), 2);
    assert_eq!(pets[0]["name"], "Luna");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pets_list_plain_prints_ids() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/pets",
        json!([{ "id": "P1", "name": "Luna" }, { "id": "P2", "name": "Milo" }]),
    )
    .await;

    let output = run_against(&server, &["-o", "plain", "pets", "list"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "P1\nP2");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unauthorized_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let output = run_against(&server, &["pets", "list"]).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_pet_exits_with_not_found_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/P9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Pet not found" })))
        .mount(&server)
        .await;

    let output = run_against(&server, &["pets", "show", "P9"]).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_merges_polled_view() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/sensor-data/pet/P1/latest",
        json!({
            "heartRate": 88, "temperature": "38.5", "activityLevel": 4,
            "batteryLevel": 81, "timestamp": "2026-03-01T10:00:00Z"
        }),
    )
    .await;
    mount_get(
        &server,
        "/sensor-data/pet/P1/stats",
        json!({ "avgheartrate": "90.5", "avgtemperature": 38.4, "avgactivity": 3, "datapoints": "12" }),
    )
    .await;
    mount_get(&server, "/pets/my-notifications", json!([])).await;
    mount_get(&server, "/pets/my-notifications/unread-count", json!({ "count": 0 })).await;
    mount_get(
        &server,
        "/collar/assignments",
        json!({ "assignments": [{ "collarId": "D1", "petId": "P1", "isActive": true }] }),
    )
    .await;
    mount_get(
        &server,
        "/location/collar/D1/current",
        json!({
            "collarId": "D1", "latitude": "6.2505", "longitude": "-75.5905",
            "accuracy": 5, "timestamp": "2026-03-01T10:00:02Z", "isCurrent": true
        }),
    )
    .await;

    let output = run_against(&server, &["-o", "json", "status", "P1"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["pet"], "P1");
    assert_eq!(report["device"], "D1");
    assert_eq!(report["telemetry"]["source"], "poll");
    assert_eq!(report["telemetry"]["value"]["heart_rate"], 88.0);
    assert_eq!(report["location"]["source"], "poll");
    assert_eq!(report["geofence"]["inside"], json!(["Home"]));
    assert_eq!(report["stats"]["data_points"], 12);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_assign_rejects_blank_device() {
    let server = MockServer::start().await;
    let output = run_against(&server, &["assign", "P1", "   "]).await;
    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_push_url_with_foreign_scheme_is_usage_error() {
    let server = MockServer::start().await;
    let output = run_against(&server, &["--push-url", "ftp://push.example.com", "watch", "P1"]).await;
    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("push_url"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_init_then_show_masks_token() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap();

    pawtrack_cmd()
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .args([
            "--api-url",
            "http://localhost:3000",
            "--token",
            "plain-secret",
            "config",
            "init",
            "--name",
            "home",
        ])
        .assert()
        .success();

    pawtrack_cmd()
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.home]")
                .and(predicate::str::contains("api_url = \"http://localhost:3000\""))
                .and(predicate::str::contains("plain-secret").not()),
        );
}
