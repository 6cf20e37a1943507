//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field
//! - Streaming via SSE with `content_block_delta` events

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sitechat_core::error::ProviderError;
use sitechat_core::message::{ChatTurn, Role};
use sitechat_core::provider::{ChatCompletion, ChatProvider, ChatRequest, StreamChunk};
use tracing::{debug, trace, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert conversation turns to Anthropic API format.
    fn to_api_messages(turns: &[ChatTurn]) -> Vec<ApiMessage> {
        turns
            .iter()
            .map(|t| ApiMessage {
                role: match t.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                },
                content: t.content.clone(),
            })
            .collect()
    }

    fn request_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "max_tokens": request.max_tokens.unwrap_or(1024),
            "temperature": request.temperature,
        });

        let system = request.system_instruction();
        if !system.is_empty() {
            body["system"] = serde_json::json!(system);
        }
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        body
    }

    fn check_status(status: u16, error_body: String) -> Result<(), ProviderError> {
        match status {
            200 => Ok(()),
            429 => Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            }),
            401 | 403 => Err(ProviderError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            )),
            _ => {
                warn!(status, body = %error_body, "Anthropic API error");
                Err(ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                })
            }
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ChatCompletion, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(&request, false);

        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            Self::check_status(status, error_body)?;
            unreachable!("check_status returns Err for non-200 status");
        }

        let api_resp: AnthropicResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Anthropic response: {e}"),
            })?;

        Ok(api_resp.into_completion())
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(&request, true);

        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            Self::check_status(status, error_body)?;
            unreachable!("check_status returns Err for non-200 status");
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    if let Some(event_type) = line.strip_prefix("event: ") {
                        if event_type.trim() == "message_stop" {
                            let _ = tx.send(Ok(StreamChunk::done())).await;
                            return;
                        }
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data: ") {
                        let data = data.trim();
                        if data.is_empty() {
                            continue;
                        }

                        let event: serde_json::Value = match serde_json::from_str(data) {
                            Ok(v) => v,
                            Err(e) => {
                                trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                                continue;
                            }
                        };

                        if event["type"].as_str() == Some("content_block_delta")
                            && event["delta"]["type"].as_str() == Some("text_delta")
                            && let Some(text) = event["delta"]["text"].as_str()
                            && !text.is_empty()
                            && tx.send(Ok(StreamChunk::delta(text))).await.is_err()
                        {
                            // Receiver dropped — client went away.
                            return;
                        }
                    }
                }
            }

            // Stream ended without message_stop — still terminate cleanly.
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl AnthropicResponse {
    fn into_completion(self) -> ChatCompletion {
        let mut text = String::new();
        for block in self.content {
            if let ResponseContentBlock::Text { text: t } = block {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&t);
            }
        }
        ChatCompletion {
            text,
            model: self.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "claude-sonnet-4-20250514".into(),
            turns: vec![
                ChatTurn::user("What services do you offer?"),
                ChatTurn::assistant("We build websites."),
                ChatTurn::user("How much?"),
            ],
            system_prompt: "You are a site assistant.".into(),
            context: "Website content:\n[Page] Pricing (/pricing)\nPlans from $10.".into(),
            temperature: 0.5,
            max_tokens: Some(512),
        }
    }

    #[test]
    fn constructor() {
        let provider = AnthropicProvider::new("sk-ant-test");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn constructor_with_base_url() {
        let provider =
            AnthropicProvider::new("sk-ant-test").with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
    }

    #[test]
    fn request_body_puts_system_top_level() {
        let provider = AnthropicProvider::new("sk-ant-test");
        let body = provider.request_body(&request(), false);
        let system = body["system"].as_str().unwrap();
        assert!(system.starts_with("You are a site assistant."));
        assert!(system.contains("Website content:"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn request_body_streaming_flag() {
        let provider = AnthropicProvider::new("sk-ant-test");
        let body = provider.request_body(&request(), true);
        assert_eq!(body["stream"], serde_json::json!(true));
        assert_eq!(body["max_tokens"], serde_json::json!(512));
    }

    #[test]
    fn turns_map_to_role_tagged_messages() {
        let msgs = AnthropicProvider::to_api_messages(&request().turns);
        assert_eq!(msgs[0].role, "user");
        assert_eq!(msgs[1].role, "assistant");
        assert_eq!(msgs[2].content, "How much?");
    }

    #[test]
    fn parse_text_response() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "model": "claude-sonnet-4-20250514",
                "content": [{"type": "text", "text": "Hello!"}],
                "usage": {"input_tokens": 10, "output_tokens": 5}
            }"#,
        )
        .unwrap();

        let completion = resp.into_completion();
        assert_eq!(completion.text, "Hello!");
        assert_eq!(completion.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn non_text_blocks_are_ignored() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "model": "claude-sonnet-4-20250514",
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "Answer."}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(resp.into_completion().text, "Answer.");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            AnthropicProvider::check_status(429, String::new()),
            Err(ProviderError::RateLimited { .. })
        ));
        assert!(matches!(
            AnthropicProvider::check_status(401, String::new()),
            Err(ProviderError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            AnthropicProvider::check_status(500, "boom".into()),
            Err(ProviderError::ApiError {
                status_code: 500,
                ..
            })
        ));
        assert!(AnthropicProvider::check_status(200, String::new()).is_ok());
    }
}
