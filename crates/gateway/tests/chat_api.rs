//! End-to-end gateway tests against a scripted provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use sitechat_config::SiteConfig;
use sitechat_content::{ContentItem, ContentKind, ContentSource, Priority, StaticSource};
use sitechat_core::{
    ChatCompletion, ChatProvider, ChatRequest, ProviderError, StreamChunk,
};
use sitechat_gateway::{AppState, build_router};

/// A provider that replays a fixed script and counts calls.
struct Scripted {
    reply: String,
    chunks: Vec<Result<StreamChunk, String>>,
    calls: AtomicUsize,
}

impl Scripted {
    fn buffered(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            chunks: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn streaming(chunks: Vec<Result<StreamChunk, String>>) -> Self {
        Self {
            reply: String::new(),
            chunks,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatCompletion {
            text: self.reply.clone(),
            model: "scripted-1".into(),
        })
    }

    async fn stream_chat(
        &self,
        _request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        for chunk in self.chunks.iter() {
            let item = match chunk {
                Ok(c) => Ok(c.clone()),
                Err(msg) => Err(ProviderError::StreamInterrupted(msg.clone())),
            };
            let _ = tx.send(item).await;
        }
        Ok(rx)
    }
}

fn corpus() -> Arc<dyn ContentSource> {
    Arc::new(StaticSource::new(vec![ContentItem {
        title: "Services".into(),
        path: "/services".into(),
        kind: ContentKind::Page,
        priority: Priority::High,
        summary: Some("What we offer".into()),
        body: "Consulting and development services.".into(),
    }]))
}

fn app(provider: Arc<Scripted>, config: SiteConfig) -> axum::Router {
    let state = AppState::new(provider, corpus(), &config);
    build_router(state, &config.server)
}

fn chat_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_endpoint() {
    let app = app(
        Arc::new(Scripted::buffered("unused")),
        SiteConfig::default(),
    );

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("\"status\":\"ok\""));
}

#[tokio::test]
async fn buffered_chat_returns_clean_content_and_split_actions() {
    let app = app(
        Arc::new(Scripted::buffered(
            "We offer consulting. [[navigate:/services]] [[suggest:How much does it cost?]]",
        )),
        SiteConfig::default(),
    );

    let req = chat_request(
        "/v1/chat",
        r#"{"messages":[{"role":"user","content":"what services?"}]}"#,
    );
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["content"], "We offer consulting.");
    assert_eq!(body["actions"][0]["type"], "navigate");
    assert_eq!(body["actions"][0]["payload"]["path"], "/services");
    assert_eq!(body["suggestions"][0], "How much does it cost?");
    // Suggestion chips never appear in the action list.
    assert_eq!(body["actions"].as_array().unwrap().len(), 1);
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn empty_messages_rejected_with_400() {
    let app = app(
        Arc::new(Scripted::buffered("unused")),
        SiteConfig::default(),
    );

    let req = chat_request("/v1/chat", r#"{"messages":[]}"#);
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("Messages are required"));
}

#[tokio::test]
async fn assistant_last_turn_rejected_with_400() {
    let provider = Arc::new(Scripted::buffered("unused"));
    let app = app(provider.clone(), SiteConfig::default());

    let req = chat_request(
        "/v1/chat",
        r#"{"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]}"#,
    );
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("Last message must be from the user"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn disabled_chat_rejected_before_any_provider_call() {
    let provider = Arc::new(Scripted::buffered("unused"));
    let mut config = SiteConfig::default();
    config.chat.enabled = false;
    let app = app(provider.clone(), config);

    let req = chat_request(
        "/v1/chat",
        r#"{"messages":[{"role":"user","content":"hi"}]}"#,
    );
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_string(response).await;
    assert!(body.contains("Chat feature is disabled"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stream_emits_tokens_then_one_complete_frame() {
    let app = app(
        Arc::new(Scripted::streaming(vec![
            Ok(StreamChunk::delta("Hel")),
            Ok(StreamChunk::delta("lo")),
            Ok(StreamChunk::done()),
        ])),
        SiteConfig::default(),
    );

    let req = chat_request(
        "/v1/chat/stream",
        r#"{"messages":[{"role":"user","content":"hi"}]}"#,
    );
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    let body = body_string(response).await;

    assert_eq!(body.matches("event: token").count(), 2);
    assert_eq!(body.matches("event: complete").count(), 1);
    assert_eq!(body.matches("event: error").count(), 0);
    assert!(body.contains(r#"{"token":"Hel"}"#));
    assert!(body.contains("\"content\":\"Hello\""));
    // The terminal frame comes last.
    let complete_at = body.find("event: complete").unwrap();
    let last_token_at = body.rfind("event: token").unwrap();
    assert!(last_token_at < complete_at);
}

#[tokio::test]
async fn stream_failure_mid_reply_ends_with_error_frame() {
    let app = app(
        Arc::new(Scripted::streaming(vec![
            Ok(StreamChunk::delta("par")),
            Ok(StreamChunk::delta("tial")),
            Err("connection reset".into()),
        ])),
        SiteConfig::default(),
    );

    let req = chat_request(
        "/v1/chat/stream",
        r#"{"messages":[{"role":"user","content":"hi"}]}"#,
    );
    let response = app.oneshot(req).await.unwrap();
    let body = body_string(response).await;

    assert_eq!(body.matches("event: token").count(), 2);
    assert_eq!(body.matches("event: error").count(), 1);
    // No complete frame after a failure.
    assert_eq!(body.matches("event: complete").count(), 0);
}

#[tokio::test]
async fn stream_validation_failure_is_a_single_error_frame() {
    let app = app(
        Arc::new(Scripted::buffered("unused")),
        SiteConfig::default(),
    );

    let req = chat_request("/v1/chat/stream", r#"{"messages":[]}"#);
    let response = app.oneshot(req).await.unwrap();

    // Streaming failures use the frame vocabulary, not HTTP status.
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert_eq!(body.matches("event: error").count(), 1);
    assert!(body.contains("Messages are required"));
}

#[tokio::test]
async fn stream_complete_frame_carries_actions_and_suggestions() {
    let app = app(
        Arc::new(Scripted::streaming(vec![
            Ok(StreamChunk::delta(
                "Here. [[navigate:/services]] [[suggest:Anything else?]]",
            )),
            Ok(StreamChunk::done()),
        ])),
        SiteConfig::default(),
    );

    let req = chat_request(
        "/v1/chat/stream",
        r#"{"messages":[{"role":"user","content":"services"}]}"#,
    );
    let response = app.oneshot(req).await.unwrap();
    let body = body_string(response).await;

    let complete_line = body
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .find(|l| l.contains("\"content\""))
        .expect("complete frame data");
    let data: serde_json::Value = serde_json::from_str(complete_line).unwrap();
    assert_eq!(data["content"], "Here.");
    assert_eq!(data["actions"][0]["type"], "navigate");
    assert_eq!(data["suggestions"][0], "Anything else?");
}
