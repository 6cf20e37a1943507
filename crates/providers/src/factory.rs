//! Provider factory — a pure mapping from configuration to an adapter.
//!
//! Configuration errors surface here, at construction: a missing
//! credential or unrecognized kind must fail before any network call,
//! not mid-stream.

use sitechat_config::{ChatConfig, ProviderKind};
use sitechat_core::error::ProviderError;
use sitechat_core::provider::ChatProvider;
use std::sync::Arc;
use tracing::info;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;

/// Per-backend fallback model, used when the configured model is empty.
/// Centralized so the defaults are tuned in one place.
pub fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Anthropic => "claude-sonnet-4-20250514",
        ProviderKind::OpenAi => "gpt-4o-mini",
        ProviderKind::Gemini => "gemini-2.0-flash",
        ProviderKind::Ollama => "llama3.2",
    }
}

/// Build the adapter for the configured backend.
///
/// Fails fast with `ProviderError::NotConfigured` when a required API
/// key is absent.
pub fn build_provider(config: &ChatConfig) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    let api_key = match config.provider.api_key_env() {
        Some(env_var) => match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                return Err(ProviderError::NotConfigured(format!(
                    "Missing API key for provider '{}' — set {env_var} or chat.api_key",
                    config.provider
                )));
            }
        },
        None => String::new(),
    };

    let provider: Arc<dyn ChatProvider> = match config.provider {
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key);
            if let Some(base_url) = &config.base_url {
                p = p.with_base_url(base_url);
            }
            Arc::new(p)
        }
        ProviderKind::OpenAi => {
            let mut p = OpenAiProvider::new(api_key);
            if let Some(base_url) = &config.base_url {
                p = p.with_base_url(base_url);
            }
            Arc::new(p)
        }
        ProviderKind::Gemini => {
            let mut p = GeminiProvider::new(api_key);
            if let Some(base_url) = &config.base_url {
                p = p.with_base_url(base_url);
            }
            Arc::new(p)
        }
        ProviderKind::Ollama => {
            let mut p = OllamaProvider::new();
            if let Some(base_url) = &config.base_url {
                p = p.with_base_url(base_url);
            }
            Arc::new(p)
        }
    };

    info!(provider = %config.provider, "Provider adapter constructed");
    Ok(provider)
}

/// The model to request: configured name, or the backend's fallback.
pub fn resolve_model(config: &ChatConfig) -> String {
    if config.model.is_empty() {
        default_model(config.provider).to_string()
    } else {
        config.model.clone()
    }
}
