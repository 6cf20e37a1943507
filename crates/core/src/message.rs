//! Conversation turn types.
//!
//! A chat request carries the full turn history on every call — the
//! server never persists conversations, so these are plain value
//! objects with no identity beyond their position in the list.

use serde::{Deserialize, Serialize};

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The AI assistant.
    Assistant,
}

/// A single turn in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who authored this turn.
    pub role: Role,

    /// The text content.
    pub content: String,
}

impl ChatTurn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
