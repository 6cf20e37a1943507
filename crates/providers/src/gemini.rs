//! Google Gemini provider implementation.
//!
//! Uses the `generateContent` / `streamGenerateContent` endpoints:
//! - `x-goog-api-key` header authentication
//! - System prompt in the top-level `systemInstruction` field
//! - Assistant turns carry the role `model`
//! - Streaming via SSE (`?alt=sse`) with candidate part deltas

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sitechat_core::error::ProviderError;
use sitechat_core::message::{ChatTurn, Role};
use sitechat_core::provider::{ChatCompletion, ChatProvider, ChatRequest, StreamChunk};
use tracing::{debug, trace, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini generateContent provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "gemini".into(),
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

    /// Convert conversation turns to Gemini `contents`.
    fn to_api_contents(turns: &[ChatTurn]) -> Vec<ApiContent> {
        turns
            .iter()
            .map(|t| ApiContent {
                role: match t.role {
                    Role::User => "user".into(),
                    Role::Assistant => "model".into(),
                },
                parts: vec![ApiPart {
                    text: t.content.clone(),
                }],
            })
            .collect()
    }

    fn request_body(request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "contents": Self::to_api_contents(&request.turns),
            "generationConfig": {
                "temperature": request.temperature,
            },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["generationConfig"]["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        let system = request.system_instruction();
        if !system.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": system }]
            });
        }

        body
    }

    fn check_status(status: u16, error_body: String) -> Result<(), ProviderError> {
        match status {
            200 => Ok(()),
            429 => Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            }),
            400 if error_body.contains("API key") => Err(ProviderError::AuthenticationFailed(
                "Invalid Gemini API key".into(),
            )),
            401 | 403 => Err(ProviderError::AuthenticationFailed(
                "Invalid Gemini API key".into(),
            )),
            _ => {
                warn!(status, body = %error_body, "Gemini API error");
                Err(ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                })
            }
        }
    }

    /// Extract the concatenated text of the first candidate.
    fn candidate_text(value: &serde_json::Value) -> Option<String> {
        let parts = value["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join("");
        Some(text)
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ChatCompletion, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, request.model
        );
        let body = Self::request_body(&request);

        debug!(provider = "gemini", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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

        let value: serde_json::Value =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Gemini response: {e}"),
            })?;

        let text = Self::candidate_text(&value).ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No candidates in Gemini response".into(),
        })?;

        Ok(ChatCompletion {
            text,
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
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let body = Self::request_body(&request);

        debug!(provider = "gemini", model = %request.model, "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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

                    if let Some(data) = line.strip_prefix("data: ") {
                        let data = data.trim();
                        if data.is_empty() {
                            continue;
                        }

                        let value: serde_json::Value = match serde_json::from_str(data) {
                            Ok(v) => v,
                            Err(e) => {
                                trace!(error = %e, data = %data, "Ignoring unparseable Gemini SSE");
                                continue;
                            }
                        };

                        if let Some(text) = Self::candidate_text(&value)
                            && !text.is_empty()
                            && tx.send(Ok(StreamChunk::delta(text))).await.is_err()
                        {
                            return; // receiver dropped
                        }
                    }
                }
            }

            // Gemini has no explicit end sentinel; connection close ends
            // the stream.
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    role: String,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    text: String,
}
