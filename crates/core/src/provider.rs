//! ChatProvider trait — the abstraction over LLM backends.
//!
//! A ChatProvider knows how to send a grounded conversation to an LLM
//! and get a reply back, either as a complete message or as a stream of
//! text deltas.
//!
//! Implementations: Anthropic, OpenAI-compatible, Gemini, Ollama.

use crate::error::ProviderError;
use crate::message::ChatTurn;
use serde::{Deserialize, Serialize};

/// Configuration for a single provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514", "gpt-4o").
    pub model: String,

    /// The conversation turns, role-tagged, forwarded unmodified.
    pub turns: Vec<ChatTurn>,

    /// The base system prompt (persona, language directive, action grammar).
    pub system_prompt: String,

    /// Grounding context text. Each adapter joins this with the system
    /// prompt into one system-level instruction.
    #[serde(default)]
    pub context: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ChatRequest {
    /// The combined system-level instruction: base prompt plus grounding
    /// context, separated by a blank line when both are present.
    pub fn system_instruction(&self) -> String {
        if self.context.is_empty() {
            self.system_prompt.clone()
        } else {
            format!("{}\n\n{}", self.system_prompt, self.context)
        }
    }
}

/// A complete (non-streaming) reply from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// The generated text.
    pub text: String,

    /// Which model actually responded (may differ from requested).
    pub model: String,
}

/// A single chunk in a streaming reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial text delta. `None` on the final chunk.
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk.
    #[serde(default)]
    pub done: bool,
}

impl StreamChunk {
    /// A text delta chunk.
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            done: false,
        }
    }

    /// The terminal chunk.
    pub fn done() -> Self {
        Self {
            content: None,
            done: true,
        }
    }
}

/// The core ChatProvider trait.
///
/// Every backend implements this trait. The response pipeline calls
/// `chat()` or `stream_chat()` without knowing which backend is wired
/// in — pure polymorphism.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send the conversation and get a complete reply.
    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatCompletion, ProviderError>;

    /// Send the conversation and get a stream of text deltas.
    ///
    /// The receiver yields zero or more delta chunks followed by exactly
    /// one `done` chunk, unless an error terminates the stream first.
    ///
    /// Default implementation calls `chat()` and wraps the result as a
    /// single delta plus the terminal chunk.
    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let completion = self.chat(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let _ = tx.send(Ok(StreamChunk::delta(completion.text))).await;
        let _ = tx.send(Ok(StreamChunk::done())).await;
        Ok(rx)
    }
}

impl std::fmt::Debug for dyn ChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatProvider")
            .field("name", &self.name())
            .finish()
    }
}
