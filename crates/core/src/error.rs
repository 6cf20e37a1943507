//! Error types for the SiteChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all SiteChat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Request handling errors ---
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from an LLM backend adapter.
///
/// `NotConfigured` is a construction-time failure (missing credential,
/// unknown provider kind); the rest occur during an actual call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Request-level failures surfaced to the HTTP caller.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// Malformed or missing request fields. Maps to 400.
    #[error("{0}")]
    Validation(String),

    /// The chat feature is switched off in configuration. Maps to 403.
    #[error("Chat feature is disabled")]
    Disabled,

    /// A provider failure that must reach the caller. Maps to 500.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn disabled_error_matches_wire_message() {
        let err = ChatError::Disabled;
        assert_eq!(err.to_string(), "Chat feature is disabled");
    }

    #[test]
    fn validation_error_carries_reason() {
        let err = ChatError::Validation("Last message must be from the user".into());
        assert_eq!(err.to_string(), "Last message must be from the user");
    }

    #[test]
    fn provider_error_converts_to_chat_error() {
        let err: ChatError = ProviderError::Network("connection refused".into()).into();
        assert!(matches!(err, ChatError::Provider(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
