#![allow(clippy::unwrap_used)]
// Integration tests for `BoneioClient` using wiremock.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use boneio_api::{BoneioClient, CoverAction, Error, FileKind};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, BoneioClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = BoneioClient::with_client(reqwest::Client::new(), base_url, Duration::from_secs(5));
    (server, client)
}

fn token(value: &str) -> SecretString {
    SecretString::from(value.to_owned())
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_auth_required() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/required"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "required": true })))
        .mount(&server)
        .await;

    assert!(client.auth_required().await.unwrap());
}

#[tokio::test]
async fn test_login_stores_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({ "username": "admin", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt-abc" })))
        .mount(&server)
        .await;

    let issued = client.login("admin", &token("secret")).await.unwrap();
    assert_eq!(issued.expose_secret(), "jwt-abc");
    assert_eq!(client.token().unwrap().expose_secret(), "jwt-abc");
}

#[tokio::test]
async fn test_login_failure() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    let result = client.login("admin", &token("wrong")).await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.has_token());
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let (server, client) = setup().await;
    client.set_token(Some(token("jwt-abc")));

    Mock::given(method("GET"))
        .and(path("/api/name"))
        .and(header("Authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "boneio-kitchen" })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.name().await.unwrap(), "boneio-kitchen");
}

#[tokio::test]
async fn test_protected_call_401_is_unauthorized() {
    let (server, client) = setup().await;
    client.set_token(Some(token("expired")));

    Mock::given(method("POST"))
        .and(path("/api/outputs/relay1/toggle"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token has expired" })),
        )
        .mount(&server)
        .await;

    let err = client.toggle_output("relay1").await.unwrap_err();
    assert!(err.is_unauthorized(), "got: {err:?}");
}

// ── Control tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_output() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/outputs/relay1/toggle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ON" })))
        .mount(&server)
        .await;

    let resp = client.toggle_output("relay1").await.unwrap();
    assert_eq!(resp.status, "ON");
}

#[tokio::test]
async fn test_toggle_unknown_output_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/outputs/nope/toggle"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "Output not found" })),
        )
        .mount(&server)
        .await;

    let err = client.toggle_output("nope").await.unwrap_err();
    assert!(err.is_not_found());
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Output not found");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_cover_commands_send_bodies() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/covers/blind/action"))
        .and(body_json(json!({ "action": "close" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/covers/blind/set_position"))
        .and(body_json(json!({ "position": 40 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/covers/blind/set_tilt"))
        .and(body_json(json!({ "tilt": 75 })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Invalid cover type" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.cover_action("blind", CoverAction::Close).await.unwrap().is_success());
    assert!(client.set_cover_position("blind", 40).await.unwrap().is_success());

    let err = client.set_cover_tilt("blind", 75).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 400, ref message } if message == "Invalid cover type"));
}

#[tokio::test]
async fn test_restart_not_available() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/restart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "not available" })))
        .mount(&server)
        .await;

    let resp = client.restart().await.unwrap();
    assert!(!resp.is_success());
    assert_eq!(resp.status, "not available");
}

// ── System tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_version() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "1.2.0" })))
        .mount(&server)
        .await;

    assert_eq!(client.version().await.unwrap(), "1.2.0");
}

#[tokio::test]
async fn test_version_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client.version().await.unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, Error::Api { status: 502, .. }));
}

#[tokio::test]
async fn test_check_configuration_reports_error_message() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/check_configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "mqtt.host is required"
        })))
        .mount(&server)
        .await;

    let resp = client.check_configuration().await.unwrap();
    assert!(!resp.is_success());
    assert_eq!(resp.message.as_deref(), Some("mqtt.host is required"));
}

#[tokio::test]
async fn test_logs_query_params() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .and(query_param("since", "10m"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs": [
                { "timestamp": "2026-10-16T08:00:00+00:00", "message": "Relay 1 ON", "level": "6" }
            ]
        })))
        .mount(&server)
        .await;

    let logs = client.logs(Some("10m"), Some(5)).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "Relay 1 ON");
}

#[tokio::test]
async fn test_check_update() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/check_update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "current_version": "1.2.0",
            "latest_version": "1.3.0",
            "update_available": true,
            "release_url": "https://example.invalid/releases/v1.3.0",
            "published_at": "2026-10-01T00:00:00Z",
            "is_prerelease": false
        })))
        .mount(&server)
        .await;

    let info = client.check_update().await.unwrap();
    assert_eq!(info.update_available, Some(true));
    assert_eq!(info.latest_version.as_deref(), Some("1.3.0"));
}

#[tokio::test]
async fn test_update_starts_in_background() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Update process started"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.update().await.unwrap();
    assert!(resp.is_success());
    assert_eq!(resp.message.as_deref(), Some("Update process started"));
}

#[tokio::test]
async fn test_parsed_config() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/config"))
        .and(header("authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "config": {
                "boneio": { "name": "garage" },
                "output": [{ "id": "relay1", "pin": "P8_30" }]
            }
        })))
        .mount(&server)
        .await;

    client.set_token(Some(token("jwt-abc")));
    let config = client.config().await.unwrap();
    assert_eq!(config["boneio"]["name"], "garage");
    assert_eq!(config["output"][0]["id"], "relay1");
}

#[tokio::test]
async fn test_parsed_config_load_failure() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "detail": "Error loading configuration: bad indent"
        })))
        .mount(&server)
        .await;

    let err = client.config().await.unwrap_err();
    assert!(
        matches!(err, Error::Api { status: 500, ref message } if message.contains("bad indent"))
    );
}

// ── File tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_put_config_section_sends_raw_body() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/config/mqtt"))
        .and(body_json(json!({ "host": "10.0.0.2", "port": 1883 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client
        .put_config_section("mqtt", &json!({ "host": "10.0.0.2", "port": 1883 }))
        .await
        .unwrap();
    assert!(resp.is_success());
}

#[tokio::test]
async fn test_list_files_with_path() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/files"))
        .and(query_param("path", "inc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "name": "config", "path": "", "type": "directory",
                "children": [{ "name": "covers.yaml", "path": "inc/covers.yaml", "type": "file" }]
            }]
        })))
        .mount(&server)
        .await;

    let items = client.list_files(Some("inc")).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, FileKind::Directory);
    assert_eq!(items[0].children[0].path, "inc/covers.yaml");
}

#[tokio::test]
async fn test_get_and_put_nested_file() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/files/inc/covers.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "cover: []\n" })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/files/inc/covers.yaml"))
        .and(body_json(json!({ "content": "cover:\n  - id: blind\n" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.get_file("inc/covers.yaml").await.unwrap(), "cover: []\n");
    let resp = client
        .put_file("inc/covers.yaml", "cover:\n  - id: blind\n")
        .await
        .unwrap();
    assert!(resp.is_success());
}

#[tokio::test]
async fn test_get_file_invalid_type() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/files/secrets.txt"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Invalid file type" })),
        )
        .mount(&server)
        .await;

    let err = client.get_file("secrets.txt").await.unwrap_err();
    assert_eq!(err.to_string(), "Device API error (HTTP 400): Invalid file type");
}

#[tokio::test]
async fn test_deserialization_error_keeps_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    match client.version().await.unwrap_err() {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>proxy</html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}
