//! The response pipeline.
//!
//! One of these per process. Each request flows through the same
//! stations: validate, assemble grounding context, resolve the reply
//! language, compose the system prompt, call the provider, then parse
//! action markers out of the reply. The buffered and streaming paths
//! share every station except delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sitechat_actions::{Action, ActionKind};
use sitechat_config::{ChatConfig, SiteConfig};
use sitechat_content::{ContentSource, ContextAssembler};
use sitechat_core::{ChatError, ChatProvider, ChatRequest, ChatTurn, Role, StreamFrame};
use sitechat_language::response_language;
use sitechat_providers::resolve_model;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::prompt::compose_system_prompt;

/// A fully processed buffered reply.
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// Marker-free answer text.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Executable actions, suggestion chips excluded.
    pub actions: Vec<Action>,
    /// Follow-up question chips, pulled out of the action list.
    pub suggestions: Vec<String>,
}

pub struct ChatPipeline {
    provider: Arc<dyn ChatProvider>,
    assembler: ContextAssembler<Arc<dyn ContentSource>>,
    chat: ChatConfig,
}

impl ChatPipeline {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        source: Arc<dyn ContentSource>,
        config: &SiteConfig,
    ) -> Self {
        Self {
            provider,
            assembler: ContextAssembler::new(source, config.context.max_chars),
            chat: config.chat.clone(),
        }
    }

    /// Request-shape checks shared by both delivery paths.
    fn validate(&self, turns: &[ChatTurn]) -> Result<(), ChatError> {
        if !self.chat.enabled {
            return Err(ChatError::Disabled);
        }
        if turns.is_empty() {
            return Err(ChatError::Validation("Messages are required".to_string()));
        }
        if turns.last().map(|t| t.role) != Some(Role::User) {
            return Err(ChatError::Validation(
                "Last message must be from the user".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the provider request: grounding context from the latest
    /// user turn, reply language resolved, system prompt composed.
    async fn prepare(&self, turns: &[ChatTurn], browser_code: &str) -> ChatRequest {
        let user_text = turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or("");

        let language = response_language(user_text, browser_code, &self.chat.default_language);
        let context = self.assembler.build_context(user_text).await;
        debug!(
            language = %language,
            context_chars = context.chars().count(),
            "prepared provider request"
        );

        ChatRequest {
            model: resolve_model(&self.chat),
            turns: turns.to_vec(),
            system_prompt: compose_system_prompt(&self.chat, &language),
            context,
            temperature: self.chat.temperature,
            max_tokens: Some(self.chat.max_tokens),
        }
    }

    /// Post-processes raw model output: strip action markers, then pull
    /// suggestion chips out of the action list. With actions disabled
    /// the text passes through untouched apart from trimming.
    fn finish(&self, raw: &str) -> (String, Vec<Action>, Vec<String>) {
        if !self.chat.actions_enabled {
            return (raw.trim().to_string(), Vec::new(), Vec::new());
        }
        let parsed = sitechat_actions::parse(raw);
        let mut actions = Vec::new();
        let mut suggestions = Vec::new();
        for action in parsed.actions {
            if action.kind == ActionKind::Suggest {
                if let Some(text) = action.payload_str("text") {
                    suggestions.push(text.to_string());
                }
            } else {
                actions.push(action);
            }
        }
        (parsed.clean_text, actions, suggestions)
    }

    /// The buffered path: one provider round trip, one JSON reply.
    pub async fn respond(
        &self,
        turns: &[ChatTurn],
        browser_code: &str,
    ) -> Result<ChatReply, ChatError> {
        self.validate(turns)?;
        let request = self.prepare(turns, browser_code).await;
        let completion = self.provider.chat(request).await?;
        let (content, actions, suggestions) = self.finish(&completion.text);
        Ok(ChatReply {
            content,
            timestamp: Utc::now(),
            actions,
            suggestions,
        })
    }

    /// The streaming path. Returns a frame receiver immediately; a
    /// background task feeds it.
    ///
    /// Every exit path of that task sends exactly one terminal frame
    /// first, with a single exception: when the client has already
    /// dropped the receiver there is no one left to tell, and the task
    /// just stops.
    pub fn respond_stream(
        self: &Arc<Self>,
        turns: Vec<ChatTurn>,
        browser_code: String,
    ) -> mpsc::Receiver<StreamFrame> {
        let (tx, rx) = mpsc::channel::<StreamFrame>(32);
        let pipeline = Arc::clone(self);

        tokio::spawn(async move {
            if let Err(e) = pipeline.validate(&turns) {
                let _ = tx.send(StreamFrame::Error { error: e.to_string() }).await;
                return;
            }

            let request = pipeline.prepare(&turns, &browser_code).await;
            let mut chunks = match pipeline.provider.stream_chat(request).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(provider = pipeline.provider.name(), error = %e, "stream setup failed");
                    let _ = tx.send(StreamFrame::Error { error: e.to_string() }).await;
                    return;
                }
            };

            let mut full = String::new();
            while let Some(chunk) = chunks.recv().await {
                match chunk {
                    Ok(chunk) if chunk.done => break,
                    Ok(chunk) => {
                        let Some(token) = chunk.content else { continue };
                        full.push_str(&token);
                        if tx.send(StreamFrame::Token { token }).await.is_err() {
                            // Client disconnected.
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(provider = pipeline.provider.name(), error = %e, "stream failed");
                        let _ = tx.send(StreamFrame::Error { error: e.to_string() }).await;
                        return;
                    }
                }
            }

            // Reaching here means the provider finished (or its channel
            // closed without a done chunk, which we treat the same).
            let (content, actions, suggestions) = pipeline.finish(&full);
            let actions = actions
                .iter()
                .filter_map(|a| serde_json::to_value(a).ok())
                .collect();
            let _ = tx
                .send(StreamFrame::Complete {
                    content,
                    timestamp: Utc::now(),
                    actions,
                    suggestions,
                })
                .await;
        });

        rx
    }
}
