//! Chat relay tests against a fake sidecar
//!
//! The fake serves a canned SSE body on 127.0.0.1 and records the request
//! it received.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use pmide_common::config::StoreConfig;
use pmide_common::events::EventBus;
use pmide_store::db::init_database;
use pmide_store::secrets::SecretBox;
use pmide_store::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::util::ServiceExt;

const COMPLETE_STREAM: &str = concat!(
    "data: {\"type\":\"conversation_id\",\"conversation_id\":\"conv-1\"}\n\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hi \"}}\n\n",
    ": keep-alive\n\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"there\"}}\n\n",
    "data: {\"type\":\"message_stop\",\"usage\":{\"input_tokens\":12,\"output_tokens\":5},\"cost\":0.0001}\n\n",
);

const ERROR_STREAM: &str = concat!(
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"partial\"}}\n\n",
    "data: {\"type\":\"error\",\"error\":\"Anthropic API error 401: invalid x-api-key\"}\n\n",
);

const TRUNCATED_STREAM: &str = "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"cut\"}}\n\n";

#[derive(Clone)]
struct FakeSidecar {
    body: &'static str,
    captured: Arc<Mutex<Option<Value>>>,
}

async fn fake_stream(State(fake): State<FakeSidecar>, Json(request): Json<Value>) -> impl IntoResponse {
    *fake.captured.lock().unwrap() = Some(request);
    ([(header::CONTENT_TYPE, "text/event-stream")], fake.body)
}

/// Start a fake sidecar; returns its base URL and the captured request slot
async fn spawn_sidecar(body: &'static str) -> (String, Arc<Mutex<Option<Value>>>) {
    let captured = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route("/chat/stream", post(fake_stream))
        .with_state(FakeSidecar { body, captured: captured.clone() });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), captured)
}

async fn setup_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("pmide.db"), &StoreConfig::default())
        .await
        .unwrap();
    let state = AppState::new(pool, EventBus::default(), SecretBox::from_key([3u8; 32]));
    (build_router(state), dir)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Value {
    let (_, text) = send(app, method, uri, body).await;
    serde_json::from_str(&text).unwrap()
}

/// Project and conversation; configures the key and sidecar when given
async fn prepare(app: &Router, sidecar_url: Option<&str>) -> String {
    if let Some(url) = sidecar_url {
        send(
            app,
            "PUT",
            "/api/settings",
            Some(json!({ "api_key": "sk-ant-test-key-1234", "sidecar_url": format!("{}/", url) })),
        )
        .await;
    }
    let project = send_json(app, "POST", "/api/projects", Some(json!({ "name": "Relay" }))).await;
    let conv = send_json(
        app,
        "POST",
        &format!("/api/projects/{}/conversations", project["id"].as_str().unwrap()),
        Some(json!({ "model": "claude-sonnet-4-20250514" })),
    )
    .await;
    conv["id"].as_str().unwrap().to_string()
}

/// JSON payloads of the `data:` lines in an SSE body
fn data_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_completed_stream_is_persisted() {
    let (sidecar, captured) = spawn_sidecar(COMPLETE_STREAM).await;
    let (app, _dir) = setup_app().await;
    let conv_id = prepare(&app, Some(&sidecar)).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/conversations/{}/chat", conv_id),
        Some(json!({ "content": "Hello", "framework_id": "rice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events = data_events(&body);
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["conversation_id", "content_block_delta", "content_block_delta", "message_stop"]
    );
    assert_eq!(events[3]["usage"]["output_tokens"], 5);

    let request = captured.lock().unwrap().clone().expect("Sidecar should be called");
    assert_eq!(request["api_key"], "sk-ant-test-key-1234");
    assert_eq!(request["model"], "claude-sonnet-4-20250514");
    assert_eq!(request["provider"], "anthropic");
    assert_eq!(request["messages"], json!([{ "role": "user", "content": "Hello" }]));
    assert!(request["system"].as_str().unwrap().contains("RICE"));

    let messages = send_json(&app, "GET", &format!("/api/conversations/{}/messages", conv_id), None).await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hi there");

    let usage = send_json(&app, "GET", "/api/usage", None).await;
    assert_eq!(usage.as_array().unwrap().len(), 1);
    assert_eq!(usage[0]["input_tokens"], 12);
    assert_eq!(usage[0]["conversation_id"], conv_id.as_str());

    let conv = send_json(&app, "GET", &format!("/api/conversations/{}", conv_id), None).await;
    assert_eq!(conv["total_tokens"], 17);
}

#[tokio::test]
async fn test_upstream_error_persists_no_reply() {
    let (sidecar, _) = spawn_sidecar(ERROR_STREAM).await;
    let (app, _dir) = setup_app().await;
    let conv_id = prepare(&app, Some(&sidecar)).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/conversations/{}/chat", conv_id),
        Some(json!({ "content": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events = data_events(&body);
    let last = events.last().unwrap();
    assert_eq!(last["type"], "error");
    assert!(last["error"].as_str().unwrap().contains("401"));

    let messages = send_json(&app, "GET", &format!("/api/conversations/{}/messages", conv_id), None).await;
    assert_eq!(messages.as_array().unwrap().len(), 1);
    let usage = send_json(&app, "GET", "/api/usage", None).await;
    assert!(usage.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_truncated_stream_reports_error() {
    let (sidecar, _) = spawn_sidecar(TRUNCATED_STREAM).await;
    let (app, _dir) = setup_app().await;
    let conv_id = prepare(&app, Some(&sidecar)).await;

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/conversations/{}/chat", conv_id),
        Some(json!({ "content": "Hello" })),
    )
    .await;

    let events = data_events(&body);
    assert_eq!(events.first().unwrap()["type"], "content_block_delta");
    assert_eq!(events.last().unwrap()["type"], "error");

    let messages = send_json(&app, "GET", &format!("/api/conversations/{}/messages", conv_id), None).await;
    assert_eq!(messages.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_api_key_rejected_before_saving() {
    let (app, _dir) = setup_app().await;
    let conv_id = prepare(&app, None).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/conversations/{}/chat", conv_id),
        Some(json!({ "content": "Hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No API key configured"));
    let messages = send_json(&app, "GET", &format!("/api/conversations/{}/messages", conv_id), None).await;
    assert!(messages.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_sidecar_is_bad_gateway() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (app, _dir) = setup_app().await;
    let conv_id = prepare(&app, Some(&url)).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/conversations/{}/chat", conv_id),
        Some(json!({ "content": "Hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_unknown_conversation_is_not_found() {
    let (app, _dir) = setup_app().await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/conversations/missing/chat",
        Some(json!({ "content": "Hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
