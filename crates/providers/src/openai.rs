//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing the
//! `/chat/completions` contract. Supports non-streaming and
//! streaming SSE (`data:` chunks terminated by `[DONE]`).

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sitechat_core::error::ProviderError;
use sitechat_core::message::{ChatTurn, Role};
use sitechat_core::provider::{ChatCompletion, ChatProvider, ChatRequest, StreamChunk};
use tracing::{debug, trace, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "openai".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Point at a compatible endpoint (proxy, vLLM, OpenRouter, ...).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert conversation turns to OpenAI API format, with the
    /// combined system instruction as the leading system message.
    fn to_api_messages(request: &ChatRequest) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);

        let system = request.system_instruction();
        if !system.is_empty() {
            messages.push(ApiMessage {
                role: "system".into(),
                content: system,
            });
        }

        for turn in &request.turns {
            messages.push(ApiMessage {
                role: match turn.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                },
                content: turn.content.clone(),
            });
        }

        messages
    }

    fn request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request),
            "temperature": request.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
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
                "Invalid API key or insufficient permissions".into(),
            )),
            _ => {
                warn!(status, body = %error_body, "Provider returned error");
                Err(ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                })
            }
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ChatCompletion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(ChatCompletion {
            text: choice.message.content.unwrap_or_default(),
            model: api_response.model,
        })
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
        let provider_name = self.name.clone();

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

                    if let Some(data) = line.strip_prefix("data: ") {
                        let data = data.trim();

                        if data == "[DONE]" {
                            let _ = tx.send(Ok(StreamChunk::done())).await;
                            return;
                        }

                        match serde_json::from_str::<StreamResponse>(data) {
                            Ok(stream_resp) => {
                                let delta = stream_resp
                                    .choices
                                    .first()
                                    .and_then(|c| c.delta.content.clone());
                                if let Some(text) = delta
                                    && !text.is_empty()
                                    && tx.send(Ok(StreamChunk::delta(text))).await.is_err()
                                {
                                    return; // receiver dropped
                                }
                            }
                            Err(e) => {
                                trace!(
                                    provider = %provider_name,
                                    data = %data,
                                    error = %e,
                                    "Ignoring unparseable SSE chunk"
                                );
                            }
                        }
                    }
                }
            }

            // Stream ended without [DONE] — still terminate cleanly.
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".into(),
            turns: vec![ChatTurn::user("hi")],
            system_prompt: "You are a site assistant.".into(),
            context: "Website content: ...".into(),
            temperature: 0.7,
            max_tokens: Some(256),
        }
    }

    #[test]
    fn system_instruction_leads_message_list() {
        let messages = OpenAiProvider::to_api_messages(&request());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Website content"));
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn empty_system_is_omitted() {
        let mut req = request();
        req.system_prompt = String::new();
        req.context = String::new();
        let messages = OpenAiProvider::to_api_messages(&req);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn request_body_includes_max_tokens() {
        let body = OpenAiProvider::request_body(&request(), false);
        assert_eq!(body["max_tokens"], serde_json::json!(256));
        assert_eq!(body["stream"], serde_json::json!(false));
    }

    #[test]
    fn parse_completion_response() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "model": "gpt-4o",
                "choices": [{"message": {"role": "assistant", "content": "Hello!"}}]
            }"#,
        )
        .unwrap();
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("Hello!"));
    }

    #[test]
    fn parse_stream_chunk() {
        let chunk: StreamResponse = serde_json::from_str(
            r#"{"choices": [{"delta": {"content": "par"}, "finish_reason": null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("par"));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiProvider::check_status(429, String::new()),
            Err(ProviderError::RateLimited { .. })
        ));
        assert!(matches!(
            OpenAiProvider::check_status(403, String::new()),
            Err(ProviderError::AuthenticationFailed(_))
        ));
        assert!(OpenAiProvider::check_status(200, String::new()).is_ok());
    }
}
