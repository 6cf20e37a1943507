//! Stream frame wire types.
//!
//! A streaming chat response is a strictly ordered sequence: zero or
//! more `token` frames, then exactly one terminal frame (`complete` or
//! `error`), after which the channel closes. Nothing survives past one
//! request/response cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One frame on the streaming wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum StreamFrame {
    /// A unit of streamed partial text from the model backend.
    Token { token: String },

    /// Terminal success frame carrying the full, marker-free reply.
    Complete {
        content: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        actions: Vec<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        suggestions: Vec<String>,
    },

    /// Terminal failure frame.
    Error { error: String },
}

impl StreamFrame {
    /// The SSE event name for this frame.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamFrame::Token { .. } => "token",
            StreamFrame::Complete { .. } => "complete",
            StreamFrame::Error { .. } => "error",
        }
    }

    /// Whether this frame terminates the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFrame::Token { .. })
    }

    /// The JSON body written to the SSE `data:` field.
    pub fn data_json(&self) -> String {
        let value = match self {
            StreamFrame::Token { token } => serde_json::json!({ "token": token }),
            StreamFrame::Complete {
                content,
                timestamp,
                actions,
                suggestions,
            } => {
                let mut obj = serde_json::json!({
                    "content": content,
                    "timestamp": timestamp.to_rfc3339(),
                });
                if !actions.is_empty() {
                    obj["actions"] = serde_json::Value::Array(actions.clone());
                }
                if !suggestions.is_empty() {
                    obj["suggestions"] = serde_json::json!(suggestions);
                }
                obj
            }
            StreamFrame::Error { error } => serde_json::json!({ "error": error }),
        };
        value.to_string()
    }
}
