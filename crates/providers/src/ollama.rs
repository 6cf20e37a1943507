//! Ollama provider implementation — local models, no credential.
//!
//! Uses Ollama's native `/api/chat` endpoint rather than its OpenAI
//! compatibility shim, because the native endpoint reports `done`
//! explicitly. Streaming responses are newline-delimited JSON objects,
//! one message delta per line.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sitechat_core::error::ProviderError;
use sitechat_core::message::{ChatTurn, Role};
use sitechat_core::provider::{ChatCompletion, ChatProvider, ChatRequest, StreamChunk};
use tracing::{debug, trace, warn};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local-model provider backed by an Ollama server.
pub struct OllamaProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider against the default local server.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            // Local inference can be slow on modest hardware.
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "ollama".into(),
            base_url: DEFAULT_BASE_URL.into(),
            client,
        }
    }

    /// Point at a non-default Ollama server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert turns to Ollama chat messages, system instruction first.
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
            "stream": stream,
            "options": {
                "temperature": request.temperature,
            },
        });
        if let Some(max_tokens) = request.max_tokens {
            body["options"]["num_predict"] = serde_json::json!(max_tokens);
        }
        body
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ChatCompletion, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(provider = "ollama", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Ollama API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: ChatLine = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse Ollama response: {e}"),
        })?;

        Ok(ChatCompletion {
            text: api_resp.message.map(|m| m.content).unwrap_or_default(),
            model: request.model,
        })
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(provider = "ollama", model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
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

                // NDJSON: one complete JSON object per line.
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() {
                        continue;
                    }

                    let parsed: ChatLine = match serde_json::from_str(&line) {
                        Ok(v) => v,
                        Err(e) => {
                            trace!(error = %e, line = %line, "Ignoring unparseable Ollama line");
                            continue;
                        }
                    };

                    if let Some(message) = parsed.message
                        && !message.content.is_empty()
                        && tx
                            .send(Ok(StreamChunk::delta(message.content)))
                            .await
                            .is_err()
                    {
                        return; // receiver dropped
                    }

                    if parsed.done {
                        let _ = tx.send(Ok(StreamChunk::done())).await;
                        return;
                    }
                }
            }

            // Connection closed without a done line — still terminate.
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<LineMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct LineMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "llama3.2".into(),
            turns: vec![ChatTurn::user("hi")],
            system_prompt: "You are a site assistant.".into(),
            context: String::new(),
            temperature: 0.2,
            max_tokens: Some(128),
        }
    }

    #[test]
    fn constructor_defaults_to_local() {
        let provider = OllamaProvider::new();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn request_body_maps_limits_to_options() {
        let body = OllamaProvider::request_body(&request(), true);
        assert_eq!(body["options"]["num_predict"], serde_json::json!(128));
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["stream"], serde_json::json!(true));
    }

    #[test]
    fn parse_chat_line() {
        let line: ChatLine = serde_json::from_str(
            r#"{"model":"llama3.2","message":{"role":"assistant","content":"Hey"},"done":false}"#,
        )
        .unwrap();
        assert_eq!(line.message.unwrap().content, "Hey");
        assert!(!line.done);
    }

    #[test]
    fn parse_done_line() {
        let line: ChatLine =
            serde_json::from_str(r#"{"model":"llama3.2","done":true,"total_duration":1}"#).unwrap();
        assert!(line.done);
        assert!(line.message.is_none());
    }
}
