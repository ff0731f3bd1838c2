//! Webhook replication through the router against a mocked GitHub API

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use labelord::config::{parse_config, ConfigFormat};
use labelord::server::{build_router, AppState, HEADER_EVENT, HEADER_SIGNATURE};
use labelord::signature::sign;
use labelord::GitHubClient;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "s3cr3t";

fn state(server: &MockServer) -> AppState {
    let config = parse_config(
        &format!(
            "[github]\ntoken = \"t\"\nwebhook_secret = \"{SECRET}\"\n\n[repos]\n\"octo/a\" = true\n\"octo/b\" = true\n"
        ),
        ConfigFormat::Toml,
    )
    .unwrap();
    let client = GitHubClient::with_base_url("t", &server.uri()).unwrap();
    AppState::new(Arc::new(client), config).unwrap()
}

fn label_request(payload: serde_json::Value) -> Request<Body> {
    let body = serde_json::to_vec(&payload).unwrap();
    let signature = sign(&body, SECRET.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/")
        .header(HEADER_EVENT, "label")
        .header(HEADER_SIGNATURE, signature)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_created_label_is_mirrored_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/b/labels"))
        .and(body_json(json!({"name": "bug", "color": "ff0000"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let state = state(&server);
    let created = |repo: &str| {
        json!({
            "action": "created",
            "repository": {"full_name": repo},
            "label": {"name": "bug", "color": "ff0000"},
        })
    };

    let response = build_router(state.clone())
        .oneshot(label_request(created("octo/a")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // GitHub notifies about the mirrored label too; it must not bounce back
    let response = build_router(state.clone())
        .oneshot(label_request(created("octo/b")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.echoes().pending(), 0);
}

#[tokio::test]
async fn test_renamed_label_is_patched_by_previous_name() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/repos/octo/a/labels/Bug"))
        .and(body_json(json!({"name": "bug", "color": "ff0000"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = build_router(state(&server))
        .oneshot(label_request(json!({
            "action": "edited",
            "repository": {"full_name": "octo/b"},
            "label": {"name": "bug", "color": "ff0000"},
            "changes": {"name": {"from": "Bug"}},
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_failed_mirror_still_acknowledges() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/repos/octo/b/labels/bug"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .expect(1)
        .mount(&server)
        .await;

    let state = state(&server);
    let response = build_router(state.clone())
        .oneshot(label_request(json!({
            "action": "deleted",
            "repository": {"full_name": "octo/a"},
            "label": {"name": "bug", "color": "ff0000"},
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.echoes().pending(), 0);
}

#[tokio::test]
async fn test_event_from_unconfigured_repository_is_ignored() {
    let server = MockServer::start().await;

    let response = build_router(state(&server))
        .oneshot(label_request(json!({
            "action": "created",
            "repository": {"full_name": "someone/else"},
            "label": {"name": "bug", "color": "ff0000"},
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.received_requests().await.unwrap().is_empty());
}
