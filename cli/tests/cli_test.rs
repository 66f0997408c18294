//! Runs the `fsconsul` binary against a mock Consul agent.

use std::path::Path;

use serde_json::json;
use tempfile::TempDir;
use tokio::process::Command;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fsconsul(args: &[&str]) -> i32 {
    let output = Command::new(env!("CARGO_BIN_EXE_fsconsul"))
        .args(args)
        .env("RUST_LOG", "debug")
        .env_remove("CONSUL_HTTP_TOKEN")
        .output()
        .await
        .unwrap();

    eprintln!("{}", String::from_utf8_lossy(&output.stderr));
    output.status.code().unwrap_or(-1)
}

async fn agent_with_config(value_b64: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/kv/app"))
        .and(query_param("recurse", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Consul-Index", "3")
                .set_body_json(json!([
                    {"Key": "app/", "Value": null, "Flags": 0, "ModifyIndex": 1},
                    {"Key": "app/config", "Value": value_b64, "Flags": 0, "ModifyIndex": 3},
                ])),
        )
        .mount(&server)
        .await;

    server
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn test_once_writes_files_and_runs_hook() {
    let server = agent_with_config("djE=").await;
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("app");
    let marker = dir.path().join("changed");

    let code = fsconsul(&[
        "--once",
        "--addr",
        &server.uri(),
        "/app",
        path_str(&root),
        "touch",
        path_str(&marker),
    ])
    .await;

    assert_eq!(code, 0);
    assert_eq!(std::fs::read(root.join("config")).unwrap(), b"v1");
    assert!(marker.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_hook_exits_111() {
    let server = agent_with_config("djE=").await;
    let dir = TempDir::new().unwrap();

    let code = fsconsul(&[
        "--once",
        "--addr",
        &server.uri(),
        "app",
        path_str(dir.path()),
        "false",
    ])
    .await;

    assert_eq!(code, 111);
}

#[tokio::test]
async fn test_config_file_mode() {
    let server = agent_with_config("djI=").await;
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("from-file");
    let config = dir.path().join("config.json");
    std::fs::write(
        &config,
        json!({
            "RunOnce": true,
            "Consul": { "Addr": server.uri() },
            "Mappings": [{ "Prefix": "app", "Path": path_str(&root) }],
        })
        .to_string(),
    )
    .unwrap();

    let code = fsconsul(&["--configFile", path_str(&config)]).await;

    assert_eq!(code, 0);
    assert_eq!(std::fs::read(root.join("config")).unwrap(), b"v2");
}

#[tokio::test]
async fn test_unreachable_agent_exits_1() {
    let dir = TempDir::new().unwrap();
    let code = fsconsul(&["--once", "--addr", "127.0.0.1:1", "app", path_str(dir.path())]).await;
    assert_eq!(code, 1);
}

#[tokio::test]
async fn test_usage_errors_exit_1() {
    assert_eq!(fsconsul(&[]).await, 1);
    assert_eq!(fsconsul(&["a|b", "/srv/a"]).await, 1);
}

#[tokio::test]
async fn test_config_file_errors() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    assert_eq!(fsconsul(&["--config-file", path_str(&missing)]).await, 2);

    let invalid = dir.path().join("invalid.json");
    std::fs::write(&invalid, "[1, 2").unwrap();
    assert_eq!(fsconsul(&["--config-file", path_str(&invalid)]).await, 3);
}

#[tokio::test]
async fn test_help_exits_0() {
    assert_eq!(fsconsul(&["--help"]).await, 0);
}
