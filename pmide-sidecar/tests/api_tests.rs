//! Sidecar API tests against fake provider and web servers
//!
//! One fake upstream on 127.0.0.1 plays Anthropic, OpenAI and a couple of
//! web pages; the sidecar's base URLs point at it.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pmide_common::chat::TokenUsage;
use pmide_common::config::SidecarConfig;
use pmide_common::pricing::calculate_cost;
use pmide_sidecar::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

const ANTHROPIC_STREAM: &str = concat!(
    "event: message_start\n",
    "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"usage\":{\"input_tokens\":25,\"output_tokens\":1}}}\n\n",
    "event: content_block_start\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    "event: ping\n",
    "data: {\"type\":\"ping\"}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" world\"}}\n\n",
    "event: content_block_stop\n",
    "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
    "event: message_delta\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":15}}\n\n",
    "event: message_stop\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

const ANTHROPIC_TRUNCATED: &str = concat!(
    "event: message_start\n",
    "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":3,\"output_tokens\":1}}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
);

const OPENAI_STREAM: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2}}\n\n",
    "data: [DONE]\n\n",
);

const ROADMAP_PAGE: &str = r#"<!doctype html>
<html>
<head><title>Q3 Roadmap</title><script>track()</script></head>
<body>
<nav>Home | Blog</nav>
<h1>Themes</h1>
<p>Retention &amp; onboarding</p>
<footer>Acme Inc</footer>
</body>
</html>"#;

#[derive(Clone, Default)]
struct Upstream {
    captured: Arc<Mutex<Option<(HeaderMap, Value)>>>,
}

impl Upstream {
    fn last(&self) -> (HeaderMap, Value) {
        self.captured.lock().unwrap().clone().expect("no upstream request recorded")
    }
}

fn sse(body: &'static str) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn anthropic_messages(State(up): State<Upstream>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    *up.captured.lock().unwrap() = Some((headers.clone(), body.clone()));

    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok()).unwrap_or("");
    if key == "bad" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}})),
        )
            .into_response();
    }
    if body["stream"] == json!(true) {
        return if key == "truncate" { sse(ANTHROPIC_TRUNCATED) } else { sse(ANTHROPIC_STREAM) };
    }
    Json(json!({
        "id": "msg_2",
        "type": "message",
        "model": "claude-sonnet-4-20250514",
        "content": [{"type": "text", "text": "Prioritize onboarding."}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 40, "output_tokens": 4}
    }))
    .into_response()
}

async fn openai_completions(State(up): State<Upstream>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    *up.captured.lock().unwrap() = Some((headers, body.clone()));
    if body["stream"] == json!(true) {
        return sse(OPENAI_STREAM);
    }
    Json(json!({
        "model": "gpt-4o-2024-08-06",
        "choices": [{"message": {"role": "assistant", "content": "Ship it."}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 11, "completion_tokens": 3}
    }))
    .into_response()
}

async fn openai_models(headers: HeaderMap) -> Response {
    let auth = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).unwrap_or("");
    if auth == "Bearer broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    Json(json!({
        "object": "list",
        "data": [{"id": "whisper-1"}, {"id": "gpt-4o-mini"}, {"id": "gpt-4o"}, {"id": "dall-e-3"}]
    }))
    .into_response()
}

async fn spawn_upstream() -> (String, Upstream) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/v1/messages", post(anthropic_messages))
        .route("/v1/chat/completions", post(openai_completions))
        .route("/v1/models", get(openai_models))
        .route("/page", get(|| async { Html(ROADMAP_PAGE) }))
        .route(
            "/notes.txt",
            get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "raw meeting notes") }),
        )
        .route(
            "/spec.pdf",
            get(|| async { ([(header::CONTENT_TYPE, "application/pdf")], "%PDF-1.7") }),
        )
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), upstream)
}

async fn setup_app() -> (Router, String, Upstream) {
    let (base, upstream) = spawn_upstream().await;
    let config = SidecarConfig {
        anthropic_base_url: base.clone(),
        openai_base_url: format!("{}/", base),
        ..SidecarConfig::default()
    };
    let state = AppState::new(config).unwrap();
    (build_router(state), base, upstream)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, String) {
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
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, text) = send(app, method, uri, body).await;
    (status, serde_json::from_str(&text).unwrap())
}

fn data_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

fn event_types(events: &[Value]) -> Vec<&str> {
    events.iter().map(|e| e["type"].as_str().unwrap()).collect()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _, _) = setup_app().await;

    let (status, info) = send_json(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["status"], "ok");
    assert_eq!(info["service"], "PM IDE Sidecar");

    let (_, health) = send_json(&app, "GET", "/health", None).await;
    assert_eq!(health, json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_anthropic_stream_with_framework_prompt() {
    let (app, _, upstream) = setup_app().await;

    let (status, headers, body) = send(
        &app,
        "POST",
        "/chat/stream",
        Some(json!({
            "project_id": "p1",
            "conversation_id": "conv-given",
            "messages": [{"role": "user", "content": "Score these features"}],
            "api_key": "sk-ant-good",
            "model": "claude-sonnet-4-20250514",
            "max_tokens": 512,
            "system": "Answer in a table.",
            "framework_id": "rice"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-accel-buffering").unwrap(), "no");
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");

    let events = data_events(&body);
    assert_eq!(
        event_types(&events),
        vec!["conversation_id", "content_block_delta", "content_block_delta", "message_stop"]
    );
    assert_eq!(events[0]["conversation_id"], "conv-given");
    assert_eq!(events[1]["delta"]["text"], "Hello");
    assert_eq!(events[2]["delta"]["text"], " world");

    let stop = &events[3];
    assert_eq!(stop["usage"], json!({"input_tokens": 25, "output_tokens": 15}));
    assert_eq!(stop["stop_reason"], "end_turn");
    let expected = calculate_cost("claude-sonnet-4-20250514", &TokenUsage::new(25, 15));
    assert!(approx(stop["cost"].as_f64().unwrap(), expected));

    let (sent_headers, sent) = upstream.last();
    assert_eq!(sent_headers.get("x-api-key").unwrap(), "sk-ant-good");
    assert_eq!(sent_headers.get("anthropic-version").unwrap(), "2023-06-01");
    assert_eq!(sent["max_tokens"], 512);
    assert_eq!(sent["stream"], true);
    let system = sent["system"].as_str().unwrap();
    assert!(system.contains("RICE"));
    assert!(system.ends_with("\n\nAnswer in a table."));
}

#[tokio::test]
async fn test_openai_stream_generates_conversation_id() {
    let (app, _, upstream) = setup_app().await;

    let (_, _, body) = send(
        &app,
        "POST",
        "/chat/stream",
        Some(json!({
            "project_id": "p1",
            "messages": [{"role": "user", "content": "Hi"}],
            "api_key": "sk-openai",
            "system": "Be brief."
        })),
    )
    .await;

    let events = data_events(&body);
    assert_eq!(
        event_types(&events),
        vec!["conversation_id", "content_block_delta", "content_block_delta", "message_stop"]
    );
    let conv_id = events[0]["conversation_id"].as_str().unwrap();
    assert!(conv_id.starts_with("conv-"));
    assert_eq!(conv_id.len(), "conv-".len() + 16);
    assert_eq!(events[3]["usage"], json!({"input_tokens": 9, "output_tokens": 2}));

    let (sent_headers, sent) = upstream.last();
    assert_eq!(sent_headers.get(header::AUTHORIZATION).unwrap(), "Bearer sk-openai");
    assert_eq!(sent["model"], "gpt-4o");
    assert_eq!(sent["max_tokens"], 4096);
    assert_eq!(sent["stream_options"]["include_usage"], true);
    assert_eq!(sent["messages"][0], json!({"role": "system", "content": "Be brief."}));
    assert_eq!(sent["messages"][1], json!({"role": "user", "content": "Hi"}));
}

#[tokio::test]
async fn test_stream_upstream_error_becomes_error_event() {
    let (app, _, _) = setup_app().await;

    let (status, _, body) = send(
        &app,
        "POST",
        "/chat/stream",
        Some(json!({
            "project_id": "p1",
            "messages": [{"role": "user", "content": "Hi"}],
            "api_key": "bad",
            "model": "claude-3-5-haiku-20241022"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events = data_events(&body);
    assert_eq!(event_types(&events), vec!["conversation_id", "error"]);
    let message = events[1]["error"].as_str().unwrap();
    assert!(message.contains("401"));
    assert!(message.contains("invalid x-api-key"));
}

#[tokio::test]
async fn test_truncated_stream_ends_with_error() {
    let (app, _, _) = setup_app().await;

    let (_, _, body) = send(
        &app,
        "POST",
        "/chat/stream",
        Some(json!({
            "project_id": "p1",
            "messages": [{"role": "user", "content": "Hi"}],
            "api_key": "truncate",
            "provider": "anthropic",
            "model": "claude-3-5-haiku-20241022"
        })),
    )
    .await;

    let events = data_events(&body);
    assert_eq!(event_types(&events), vec!["conversation_id", "content_block_delta", "error"]);
}

#[tokio::test]
async fn test_stream_with_unknown_framework_reports_error() {
    let (app, _, _) = setup_app().await;

    let (_, _, body) = send(
        &app,
        "POST",
        "/chat/stream",
        Some(json!({
            "project_id": "p1",
            "messages": [{"role": "user", "content": "Hi"}],
            "api_key": "sk-openai",
            "framework_id": "no-such-framework"
        })),
    )
    .await;

    let events = data_events(&body);
    assert_eq!(event_types(&events), vec!["conversation_id", "error"]);
}

#[tokio::test]
async fn test_chat_non_streaming() {
    let (app, _, _) = setup_app().await;

    let (status, reply) = send_json(
        &app,
        "POST",
        "/chat",
        Some(json!({
            "project_id": "p1",
            "conversation_id": "conv-abc",
            "messages": [{"role": "user", "content": "What first?"}],
            "api_key": "sk-ant-good",
            "model": "claude-sonnet-4-20250514"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["conversation_id"], "conv-abc");
    assert_eq!(reply["content"], "Prioritize onboarding.");
    assert_eq!(reply["usage"], json!({"input_tokens": 40, "output_tokens": 4}));
    let expected = calculate_cost("claude-sonnet-4-20250514", &TokenUsage::new(40, 4));
    assert!(approx(reply["cost"].as_f64().unwrap(), expected));

    let (_, openai) = send_json(
        &app,
        "POST",
        "/chat",
        Some(json!({
            "project_id": "p1",
            "messages": [{"role": "user", "content": "Ready?"}],
            "api_key": "sk-openai"
        })),
    )
    .await;
    assert_eq!(openai["content"], "Ship it.");
    assert_eq!(openai["model"], "gpt-4o-2024-08-06");
    assert!(openai["conversation_id"].as_str().unwrap().starts_with("conv-"));
}

#[tokio::test]
async fn test_chat_errors() {
    let (app, _, _) = setup_app().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/chat",
        Some(json!({"project_id": "p1", "messages": [{"role": "user", "content": "x"}], "api_key": " "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = send_json(
        &app,
        "POST",
        "/chat",
        Some(json!({"project_id": "p1", "messages": [], "api_key": "sk-openai"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(
        &app,
        "POST",
        "/chat",
        Some(json!({
            "project_id": "p1",
            "messages": [{"role": "user", "content": "x"}],
            "api_key": "bad",
            "model": "claude-3-opus-20240229"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");

    let (status, _) = send_json(
        &app,
        "POST",
        "/chat",
        Some(json!({
            "project_id": "p1",
            "messages": [{"role": "user", "content": "x"}],
            "api_key": "sk-openai",
            "framework_id": "missing"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_models() {
    let (app, _, _) = setup_app().await;

    let (status, openai) = send_json(&app, "GET", "/models?api_key=sk-openai", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(openai["models"], json!(["gpt-4o", "gpt-4o-mini"]));

    let (_, fallback) = send_json(&app, "GET", "/models?api_key=broken&provider=openai", None).await;
    assert_eq!(fallback["models"], json!(["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"]));

    let (_, anthropic) = send_json(&app, "GET", "/models?provider=anthropic", None).await;
    assert_eq!(anthropic["models"].as_array().unwrap().len(), 5);

    let (status, _) = send_json(&app, "GET", "/models", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, "GET", "/models?api_key=k&provider=mistral", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_parse_documents() {
    let (app, base, _) = setup_app().await;

    let (status, page) = send_json(
        &app,
        "POST",
        "/documents/parse",
        Some(json!({"doc_type": "url", "source": format!("{}/page", base)})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["title"], "Q3 Roadmap");
    assert_eq!(page["type"], "html");
    assert_eq!(page["content"], "Q3 Roadmap\nThemes\nRetention & onboarding");

    let (_, plain) = send_json(
        &app,
        "POST",
        "/documents/parse",
        Some(json!({"doc_type": "url", "source": format!("{}/notes.txt", base)})),
    )
    .await;
    assert_eq!(plain["content"], "raw meeting notes");

    let (status, pdf) = send_json(
        &app,
        "POST",
        "/documents/parse",
        Some(json!({"doc_type": "url", "source": format!("{}/spec.pdf", base)})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(pdf["error"]["message"].as_str().unwrap().contains("PDF parsing not available"));

    let (status, _) = send_json(
        &app,
        "POST",
        "/documents/parse",
        Some(json!({"doc_type": "url", "source": format!("{}/missing", base)})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, text) = send_json(
        &app,
        "POST",
        "/documents/parse",
        Some(json!({"doc_type": "text", "source": "", "content": "pasted"})),
    )
    .await;
    assert_eq!(text, json!({"content": "pasted", "title": "Text Document", "type": "text"}));

    let (status, _) = send_json(
        &app,
        "POST",
        "/documents/parse",
        Some(json!({"doc_type": "google_doc", "source": "https://example.com/not-a-doc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, "POST", "/documents/parse", Some(json!({"doc_type": "docx", "source": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_framework_endpoints() {
    let (app, _, _) = setup_app().await;

    let (_, list) = send_json(&app, "GET", "/frameworks", None).await;
    assert!(list["frameworks"].as_array().unwrap().len() >= 11);

    let (_, categories) = send_json(&app, "GET", "/frameworks/categories", None).await;
    let ids: Vec<&str> = categories["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"prioritization"));

    let (status, rice) = send_json(&app, "GET", "/frameworks/rice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rice["name"], "RICE Scoring");

    let (status, missing) = send_json(&app, "GET", "/frameworks/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"]["code"], "NOT_FOUND");
}
