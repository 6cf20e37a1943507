//! Wire types and request handlers.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use sitechat_actions::Action;
use sitechat_core::{ChatError, ChatTurn};
use sitechat_language::browser_language;

use crate::AppState;

/// Request body shared by both chat routes.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<ChatTurn>,

    /// Language code the embedding page reports, if any. Takes
    /// precedence over the Accept-Language header.
    #[serde(default, rename = "currentLanguage")]
    pub current_language: Option<String>,
}

/// Buffered reply body.
#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub content: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Resolve the browser-side language signal for this request. The
/// client-reported page language wins; the Accept-Language header is
/// the fallback.
fn browser_code(headers: &HeaderMap, body: &ChatBody) -> String {
    if let Some(lang) = body.current_language.as_deref()
        && !lang.trim().is_empty()
    {
        return lang.trim().to_lowercase();
    }
    let header = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    browser_language(header, "")
}

fn error_response(err: ChatError) -> Response {
    let status = match &err {
        ChatError::Validation(_) => StatusCode::BAD_REQUEST,
        ChatError::Disabled => StatusCode::FORBIDDEN,
        ChatError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// `POST /v1/chat` — buffered JSON reply.
pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    let browser = browser_code(&headers, &body);
    match state.pipeline.respond(&body.messages, &browser).await {
        Ok(reply) => Json(ChatResponseBody {
            content: reply.content,
            timestamp: reply.timestamp.to_rfc3339(),
            actions: reply.actions,
            suggestions: reply.suggestions,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

/// `POST /v1/chat/stream` — SSE reply.
///
/// Always answers 200 with an event stream; failures arrive as a
/// terminal `error` frame rather than an HTTP status, so the client
/// handles one shape on both the happy and the failure path.
pub async fn chat_stream_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    let browser = browser_code(&headers, &body);
    let rx = state.pipeline.respond_stream(body.messages, browser);

    let stream = ReceiverStream::new(rx).map(|frame| {
        Ok::<_, Infallible>(
            Event::default()
                .event(frame.event_name())
                .data(frame.data_json()),
        )
    });

    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_language_beats_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, "fr-FR,fr;q=0.9".parse().unwrap());
        let body = ChatBody {
            messages: vec![],
            current_language: Some("De".into()),
        };
        assert_eq!(browser_code(&headers, &body), "de");
    }

    #[test]
    fn header_used_when_no_page_language() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            "es-MX,es;q=0.9,en;q=0.5".parse().unwrap(),
        );
        let body = ChatBody {
            messages: vec![],
            current_language: None,
        };
        assert_eq!(browser_code(&headers, &body), "es");
    }

    #[test]
    fn blank_signals_collapse_to_empty() {
        let body = ChatBody {
            messages: vec![],
            current_language: Some("   ".into()),
        };
        assert_eq!(browser_code(&HeaderMap::new(), &body), "");
    }
}
