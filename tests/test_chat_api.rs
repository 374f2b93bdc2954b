//! End-to-end tests for the chat endpoints.
//!
//! The router is driven with `tower::ServiceExt::oneshot`, using the mock
//! provider or a scripted provider that replays a fixed fragment sequence.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chat_stream_server::{
    api::{router, AppState},
    core::{init_metrics, AppConfig},
    provider::{ChatProvider, FragmentStream, MockProvider, ProviderError, MOCK_RESPONSE},
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Provider that replays a scripted sequence and counts its invocations.
struct ScriptedProvider {
    script: Vec<Result<&'static str, &'static str>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn new(script: Vec<Result<&'static str, &'static str>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                script,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn complete(&self, _message: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut text = String::new();
        for item in &self.script {
            match item {
                Ok(fragment) => text.push_str(fragment),
                Err(message) => return Err(ProviderError::Upstream(message.to_string())),
            }
        }
        Ok(text)
    }

    fn stream(&self, _message: &str) -> FragmentStream {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items: Vec<Result<String, ProviderError>> = self
            .script
            .iter()
            .map(|item| match item {
                Ok(fragment) => Ok(fragment.to_string()),
                Err(message) => Err(ProviderError::Upstream(message.to_string())),
            })
            .collect();
        Box::pin(futures::stream::iter(items))
    }
}

fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "USE_MOCK" => Some("true".to_string()),
        "MOCK_DELAY_MS" => Some("0".to_string()),
        _ => None,
    })
    .expect("valid test config")
}

fn app_with(provider: Arc<dyn ChatProvider>) -> Router {
    init_metrics();
    router(Arc::new(AppState::new(test_config(), provider)))
}

fn mock_app() -> Router {
    app_with(Arc::new(MockProvider::new("gpt-5", Duration::ZERO)))
}

fn post_chat(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_stream(query: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/chat/stream{}", query))
        .body(Body::empty())
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Split an SSE body into `(event, data)` pairs.
fn parse_frames(body: &str) -> Vec<(String, Value)> {
    assert!(body.ends_with("\n\n"), "body not frame-terminated: {:?}", body);
    body.split_terminator("\n\n")
        .map(|frame| {
            let mut lines = frame.lines();
            let event = lines
                .next()
                .and_then(|l| l.strip_prefix("event: "))
                .unwrap_or_else(|| panic!("missing event line in {:?}", frame));
            let data = lines
                .next()
                .and_then(|l| l.strip_prefix("data: "))
                .unwrap_or_else(|| panic!("missing data line in {:?}", frame));
            assert!(lines.next().is_none(), "unexpected extra line in {:?}", frame);
            (event.to_string(), serde_json::from_str(data).unwrap())
        })
        .collect()
}

// ============================================================================
// POST /chat
// ============================================================================

#[tokio::test]
async fn test_chat_once_mock() {
    let response = mock_app()
        .oneshot(post_chat(r#"{"message": "hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json, json!({"text": "Texto para hacer test del text streaming"}));
}

#[tokio::test]
async fn test_chat_once_mock_is_idempotent() {
    let app = mock_app();
    for message in ["hello", "otra pregunta", "hello"] {
        let body = json!({ "message": message }).to_string();
        let response = app.clone().oneshot(post_chat(&body)).await.unwrap();
        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["text"], MOCK_RESPONSE);
    }
}

#[tokio::test]
async fn test_chat_once_rejects_blank_message() {
    let (provider, calls) = ScriptedProvider::new(vec![Ok("unused")]);
    let app = app_with(Arc::new(provider));

    for body in [
        r#"{"message": ""}"#,
        r#"{"message": "   \n\t"}"#,
        r#"{}"#,
        r#"{"message": null}"#,
    ] {
        let response = app.clone().oneshot(post_chat(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);

        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["message"], "message is required");
        assert_eq!(json["error"]["code"], 400);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_once_rejects_invalid_json() {
    let (provider, calls) = ScriptedProvider::new(vec![Ok("unused")]);
    let app = app_with(Arc::new(provider));

    for body in ["not json", r#"{"message": 42}"#] {
        let response = app.clone().oneshot(post_chat(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_once_passes_trimmed_message() {
    let (provider, calls) = ScriptedProvider::new(vec![Ok("Hola "), Ok("mundo")]);
    let app = app_with(Arc::new(provider));

    let response = app
        .oneshot(post_chat(r#"{"message": "  hola  "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json, json!({"text": "Hola mundo"}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_chat_once_provider_failure_is_server_error() {
    let (provider, _) = ScriptedProvider::new(vec![Ok("partial"), Err("upstream exploded")]);
    let app = app_with(Arc::new(provider));

    let response = app
        .oneshot(post_chat(r#"{"message": "hello"}"#))
        .await
        .unwrap();

    assert!(response.status().is_server_error());
    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(json.get("text").is_none());
    assert_eq!(json["error"]["message"], "upstream exploded");
}

// ============================================================================
// GET /chat/stream
// ============================================================================

#[tokio::test]
async fn test_stream_mock_frames() {
    let response = mock_app()
        .oneshot(get_stream("?message=hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "no-cache, no-transform"
    );
    assert_eq!(response.headers()[header::CONNECTION], "keep-alive");

    let frames = parse_frames(&body_string(response).await);

    let mut expected = vec![("ready".to_string(), json!({}))];
    for word in ["Texto", "para", "hacer", "test", "del", "text", "streaming"] {
        expected.push(("delta".to_string(), json!({ "delta": format!("{} ", word) })));
    }
    expected.push(("done".to_string(), json!({})));

    assert_eq!(frames, expected);
}

#[tokio::test(start_paused = true)]
async fn test_stream_mock_pacing() {
    let app = app_with(Arc::new(MockProvider::new(
        "gpt-5",
        Duration::from_millis(80),
    )));

    let start = tokio::time::Instant::now();
    let response = app.oneshot(get_stream("?message=hello")).await.unwrap();
    let frames = parse_frames(&body_string(response).await);

    assert_eq!(frames.len(), 9);
    assert!(start.elapsed() >= Duration::from_millis(7 * 80));
}

#[tokio::test]
async fn test_stream_rejects_blank_message() {
    let (provider, calls) = ScriptedProvider::new(vec![Ok("unused")]);
    let app = app_with(Arc::new(provider));

    for query in ["", "?message=", "?message=%20%20", "?message=%0A%09", "?other=x"] {
        let response = app.clone().oneshot(get_stream(query)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{:?}", query);
        assert_ne!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream; charset=utf-8"
        );

        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["message"], "message query param is required");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stream_empty_sequence() {
    let (provider, _) = ScriptedProvider::new(vec![]);
    let response = app_with(Arc::new(provider))
        .oneshot(get_stream("?message=hello"))
        .await
        .unwrap();

    let frames = parse_frames(&body_string(response).await);
    assert_eq!(
        frames,
        vec![
            ("ready".to_string(), json!({})),
            ("done".to_string(), json!({})),
        ]
    );
}

#[tokio::test]
async fn test_stream_single_fragment() {
    let (provider, _) = ScriptedProvider::new(vec![Ok("solo")]);
    let response = app_with(Arc::new(provider))
        .oneshot(get_stream("?message=hello"))
        .await
        .unwrap();

    let frames = parse_frames(&body_string(response).await);
    assert_eq!(
        frames,
        vec![
            ("ready".to_string(), json!({})),
            ("delta".to_string(), json!({"delta": "solo"})),
            ("done".to_string(), json!({})),
        ]
    );
}

#[tokio::test]
async fn test_stream_failure_after_fragments() {
    let (provider, _) = ScriptedProvider::new(vec![
        Ok("uno "),
        Ok("dos "),
        Err("rate limit reached"),
        Ok("never sent"),
    ]);
    let response = app_with(Arc::new(provider))
        .oneshot(get_stream("?message=hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let frames = parse_frames(&body_string(response).await);
    assert_eq!(
        frames,
        vec![
            ("ready".to_string(), json!({})),
            ("delta".to_string(), json!({"delta": "uno "})),
            ("delta".to_string(), json!({"delta": "dos "})),
            ("error".to_string(), json!({"message": "rate limit reached"})),
        ]
    );
}

#[tokio::test]
async fn test_stream_immediate_failure() {
    let (provider, _) = ScriptedProvider::new(vec![Err("no capacity")]);
    let response = app_with(Arc::new(provider))
        .oneshot(get_stream("?message=hello"))
        .await
        .unwrap();

    let frames = parse_frames(&body_string(response).await);
    assert_eq!(
        frames,
        vec![
            ("ready".to_string(), json!({})),
            ("error".to_string(), json!({"message": "no capacity"})),
        ]
    );
}

#[tokio::test]
async fn test_stream_fragment_text_untouched() {
    let (provider, _) = ScriptedProvider::new(vec![Ok("  lead"), Ok("line\nbreak"), Ok("\"quoted\" ")]);
    let response = app_with(Arc::new(provider))
        .oneshot(get_stream("?message=hello"))
        .await
        .unwrap();

    let deltas: Vec<String> = parse_frames(&body_string(response).await)
        .into_iter()
        .filter(|(event, _)| event == "delta")
        .map(|(_, data)| data["delta"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(deltas, vec!["  lead", "line\nbreak", "\"quoted\" "]);
}

// ============================================================================
// Ambient endpoints
// ============================================================================

#[tokio::test]
async fn test_health() {
    let response = mock_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json, json!({"status": "ok", "provider": "mock", "model": "gpt-5"}));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = mock_app();
    let streamed = app
        .clone()
        .oneshot(get_stream("?message=hello"))
        .await
        .unwrap();
    body_string(streamed).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("chat_stream_requests_total"));
}
