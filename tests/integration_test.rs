//! Integration tests for the service registry API
//!
//! These tests verify the entire application stack including:
//! - HTTP routing and bearer authentication
//! - Request validation and error bodies
//! - Database operations and subdomain uniqueness
//! - Client config generation

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use tunnel_registry::auth::{Claims, TokenGuard};
use tunnel_registry::config::TunnelSettings;
use tunnel_registry::database::ServiceStore;
use tunnel_registry::model::Role;
use tunnel_registry::notifier::LogNotifier;
use tunnel_registry::registry::ServiceRegistry;
use tunnel_registry::route::create_app;
use tunnel_registry::state::AppState;

const TEST_SECRET: &[u8] = b"integration-test-secret";

fn settings() -> TunnelSettings {
    TunnelSettings {
        server_addr: "tunnel.example.com".to_string(),
        server_port: 7000,
        auth_token: "frp-token".to_string(),
        base_domain: "example.com".to_string(),
        primary_host: Some("panda.example.com".to_string()),
    }
}

/// Helper function to create a test application with a temporary database
fn setup_test_app() -> (Router, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let store = ServiceStore::open(temp_db.path()).expect("Failed to initialize test database");

    let state = AppState {
        registry: ServiceRegistry::new(store, settings(), Arc::new(LogNotifier)),
        guard: Arc::new(TokenGuard::new(TEST_SECRET)),
    };

    (create_app(state), temp_db)
}

fn token(user_id: &str, role: Role) -> String {
    TokenGuard::new(TEST_SECRET)
        .issue(&Claims::new(user_id, role, Duration::hours(1)))
        .unwrap()
}

fn service_payload(name: &str, subdomain: &str) -> Value {
    json!({
        "name": name,
        "description": "a valid description here",
        "localPort": 8080,
        "subdomain": subdomain,
        "frpType": "http"
    })
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"));

    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    (status, response_json(response.into_body()).await)
}

async fn post_service(app: &Router, token: &str, payload: Value) -> (StatusCode, Value) {
    send(app, "POST", "/api/services", token, Some(payload)).await
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _temp_db) = setup_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_service_success() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (status, body) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ownerId"], "alice");
    assert_eq!(body["name"], "svc-A");
    assert_eq!(body["subdomain"], "alpha");
    assert_eq!(body["publicUrl"], "http://alpha.panda.example.com");
    assert_eq!(body["useEncryption"], true);
    assert_eq!(body["useCompression"], false);
    assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_public_url_is_not_taken_from_input() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let mut payload = service_payload("svc-A", "alpha");
    payload["publicUrl"] = json!("http://evil.example.org");

    let (status, body) = post_service(&app, &alice, payload).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["publicUrl"], "http://alpha.panda.example.com");
}

#[tokio::test]
async fn test_duplicate_subdomain_from_other_owner() {
    let (app, _temp_db) = setup_test_app();

    let (status, _) = post_service(&app, &token("alice", Role::Free), service_payload("svc-A", "alpha")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_service(&app, &token("bob", Role::Free), service_payload("svc-B", "alpha")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_subdomain");
}

#[tokio::test]
async fn test_udp_without_remote_port_fails_validation() {
    let (app, _temp_db) = setup_test_app();

    let mut payload = service_payload("voice", "voice-chat");
    payload["frpType"] = json!("udp");

    let (status, body) = post_service(&app, &token("alice", Role::Free), payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");
    assert!(body["details"]["remotePort"].is_array());
}

#[tokio::test]
async fn test_remote_port_only_required_for_tcp() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let mut payload = service_payload("svc-A", "alpha");
    payload["frpType"] = json!("tcp");
    let (status, body) = post_service(&app, &alice, payload.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["remotePort"].is_array());

    payload["frpType"] = json!("http");
    let (status, _) = post_service(&app, &alice, payload).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_invalid_body_is_validation_error() {
    let (app, _temp_db) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/services")
                .header("Authorization", format!("Bearer {}", token("alice", Role::Free)))
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response.into_body()).await;
    assert!(body["details"]["body"].is_array());
}

#[tokio::test]
async fn test_wrong_field_types_are_field_errors() {
    let (app, _temp_db) = setup_test_app();

    let mut payload = service_payload("svc-A", "alpha");
    payload["frpType"] = json!(5);
    payload["name"] = json!(12345);
    payload["useEncryption"] = json!("yes");
    payload["localPort"] = json!("abc");

    let (status, body) = post_service(&app, &token("alice", Role::Free), payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_failed");
    let details = &body["details"];
    assert_eq!(details["frpType"], json!(["Invalid tunnel type"]));
    assert_eq!(details["name"], json!(["Name must be a string"]));
    assert_eq!(details["useEncryption"], json!(["Use encryption must be true or false"]));
    assert_eq!(details["localPort"], json!(["Local port must be a number"]));
    assert!(details.get("body").is_none());
}

#[tokio::test]
async fn test_unknown_api_path_is_not_found() {
    let (app, _temp_db) = setup_test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/nope")
                .header("Authorization", format!("Bearer {}", token("alice", Role::Free)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_round_trip() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let id = created["id"].as_str().unwrap();

    let (status, fetched) = send(&app, "GET", &format!("/api/services/{id}"), &alice, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_other_user_gets_not_found() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);
    let bob = token("bob", Role::Premium);

    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let uri = format!("/api/services/{}", created["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, &bob, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PUT", &uri, &bob, Some(service_payload("hijack", "hijack"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, &bob, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Still intact for the owner
    let (status, _) = send(&app, "GET", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_twice() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let id = created["id"].as_str().unwrap();
    let uri = format!("/api/services/{id}");

    let (status, body) = send(&app, "DELETE", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedId"], id);

    let (status, body) = send(&app, "DELETE", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_delete_releases_subdomain() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let uri = format!("/api/services/{}", created["id"].as_str().unwrap());
    send(&app, "DELETE", &uri, &alice, None).await;

    let (status, _) = post_service(&app, &token("bob", Role::Free), service_payload("svc-B", "alpha")).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_list_is_owner_scoped_and_newest_first() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Premium);
    let bob = token("bob", Role::Free);

    for i in 1..=3 {
        post_service(&app, &alice, service_payload(&format!("svc-{i}"), &format!("alice-{i}"))).await;
    }
    post_service(&app, &bob, service_payload("bob-svc", "bobs")).await;

    let (status, body) = send(&app, "GET", "/api/services", &alice, None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["svc-3", "svc-2", "svc-1"]);
}

#[tokio::test]
async fn test_update_changes_subdomain_and_public_url() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let uri = format!("/api/services/{}", created["id"].as_str().unwrap());

    let mut payload = service_payload("svc-A2", "beta");
    payload["frpType"] = json!("tcp");
    payload["remotePort"] = json!("6000");
    let (status, updated) = send(&app, "PUT", &uri, &alice, Some(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["createdAt"], created["createdAt"]);
    assert_eq!(updated["name"], "svc-A2");
    assert_eq!(updated["remotePort"], 6000);
    assert_eq!(updated["publicUrl"], "http://beta.panda.example.com");

    // The old subdomain is free again
    let (status, body) = send(&app, "GET", "/api/subdomains/alpha", &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);
}

#[tokio::test]
async fn test_update_keeping_subdomain_is_allowed() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let uri = format!("/api/services/{}", created["id"].as_str().unwrap());

    let mut payload = service_payload("svc-A", "alpha");
    payload["description"] = json!("an updated description");
    let (status, updated) = send(&app, "PUT", &uri, &alice, Some(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "an updated description");
}

#[tokio::test]
async fn test_update_to_taken_subdomain_conflicts() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    post_service(&app, &token("bob", Role::Free), service_payload("svc-B", "taken")).await;
    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let uri = format!("/api/services/{}", created["id"].as_str().unwrap());

    let (status, body) = send(&app, "PUT", &uri, &alice, Some(service_payload("svc-A", "taken"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_subdomain");
}

#[tokio::test]
async fn test_update_revalidates_remote_port() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let uri = format!("/api/services/{}", created["id"].as_str().unwrap());

    let mut payload = service_payload("svc-A", "alpha");
    payload["frpType"] = json!("udp");
    let (status, body) = send(&app, "PUT", &uri, &alice, Some(payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["remotePort"].is_array());
}

#[tokio::test]
async fn test_quota_is_enforced_per_role() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    for i in 1..=3 {
        let (status, _) = post_service(&app, &alice, service_payload(&format!("svc-{i}"), &format!("sub-{i}"))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = post_service(&app, &alice, service_payload("svc-4", "sub-4")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "quota_exceeded");

    let (status, body) = send(&app, "GET", "/api/me", &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "alice");
    assert_eq!(body["role"], "FREE");
    assert_eq!(body["maxTunnels"], 3);
    assert_eq!(body["used"], 3);
}

#[tokio::test]
async fn test_service_config_artifacts() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (_, created) = post_service(&app, &alice, service_payload("svc-A", "alpha")).await;
    let uri = format!("/api/services/{}/config", created["id"].as_str().unwrap());

    let (status, body) = send(&app, "GET", &uri, &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configFileName"], "svc-A.toml");
    assert_eq!(body["scriptFileName"], "start-svc-A.sh");

    let config = body["config"].as_str().unwrap();
    assert!(config.contains("serverAddr = \"tunnel.example.com\""));
    assert!(config.contains("auth.token = \"frp-token\""));
    assert!(config.contains("[[proxies]]"));
    assert!(config.contains("subdomain = \"alpha\""));

    let script = body["script"].as_str().unwrap();
    assert!(script.contains("http://alpha.panda.example.com"));

    // Artifacts are reproducible
    let (_, again) = send(&app, "GET", &uri, &alice, None).await;
    assert_eq!(again, body);

    let (status, _) = send(&app, "GET", &uri, &token("bob", Role::Free), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subdomain_availability() {
    let (app, _temp_db) = setup_test_app();
    let alice = token("alice", Role::Free);

    let (status, body) = send(&app, "GET", "/api/subdomains/myapp", &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);
    assert_eq!(body["publicUrl"], "http://myapp.panda.example.com");

    post_service(&app, &alice, service_payload("svc-A", "myapp")).await;

    let (_, body) = send(&app, "GET", "/api/subdomains/myapp", &alice, None).await;
    assert_eq!(body["available"], false);

    let (status, body) = send(&app, "GET", "/api/subdomains/MyApp", &alice, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["subdomain"].is_array());
}

#[tokio::test]
async fn test_admin_lists_every_service() {
    let (app, _temp_db) = setup_test_app();

    post_service(&app, &token("alice", Role::Free), service_payload("svc-A", "alpha")).await;
    post_service(&app, &token("bob", Role::Free), service_payload("svc-B", "bravo")).await;

    let (status, body) = send(&app, "GET", "/api/admin/services", &token("root", Role::Admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let subdomains: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["subdomain"].as_str().unwrap())
        .collect();
    assert_eq!(subdomains, ["bravo", "alpha"]);
}

#[tokio::test]
async fn test_admin_can_read_and_delete_foreign_service() {
    let (app, _temp_db) = setup_test_app();
    let root = token("root", Role::Admin);

    let (_, created) = post_service(&app, &token("alice", Role::Free), service_payload("svc-A", "alpha")).await;
    let uri = format!("/api/services/{}", created["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, &root, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", &uri, &root, None).await;
    assert_eq!(status, StatusCode::OK);
}
