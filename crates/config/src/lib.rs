//! Configuration loading, validation, and management for SiteChat.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides for secrets. Validates all settings at startup so operator
//! errors surface immediately, not mid-stream.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Which LLM backend to route chat requests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
    Ollama,
}

impl ProviderKind {
    /// The environment variable holding this backend's API key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
        };
        write!(f, "{name}")
    }
}

/// The root configuration structure. Maps directly to `sitechat.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Chat feature settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Grounding context settings.
    #[serde(default)]
    pub context: ContextConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Content source settings.
    #[serde(default)]
    pub content: ContentConfig,
}

/// Chat feature configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Master switch for the chat feature. Disabled requests get 403.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Which backend handles chat requests.
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Model name. Empty string means "use the backend's default".
    #[serde(default)]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// API key override. Falls back to the backend's env variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (proxies, self-hosted endpoints).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Fallback language when neither the message nor the browser gives
    /// a usable signal.
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Add a note telling the model the site serves a multilingual
    /// audience.
    #[serde(default)]
    pub multilingual: bool,

    /// Teach the model the in-band action marker grammar.
    #[serde(default = "default_true")]
    pub actions_enabled: bool,

    /// Base persona prompt. Empty string uses the built-in default.
    #[serde(default)]
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            model: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: None,
            base_url: None,
            default_language: default_language(),
            multilingual: false,
            actions_enabled: true,
            system_prompt: String::new(),
        }
    }
}

/// Grounding context configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard ceiling on assembled context length, in characters.
    #[serde(default = "default_max_context_chars")]
    pub max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_context_chars(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty means same-origin only.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Content source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Path to a JSON file of content items. Empty means an empty
    /// in-memory corpus (the assembler degrades gracefully).
    #[serde(default)]
    pub corpus_path: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            corpus_path: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_provider() -> ProviderKind {
    ProviderKind::Anthropic
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_language() -> String {
    "en".into()
}
fn default_max_context_chars() -> usize {
    8_000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8787
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_language", &self.default_language)
            .field("multilingual", &self.multilingual)
            .field("actions_enabled", &self.actions_enabled)
            .finish()
    }
}

impl std::fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteConfig")
            .field("chat", &self.chat)
            .field("context", &self.context)
            .field("server", &self.server)
            .field("content", &self.content)
            .finish()
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            context: ContextConfig::default(),
            server: ServerConfig::default(),
            content: ContentConfig::default(),
        }
    }
}

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl SiteConfig {
    /// Load configuration from a TOML file, then apply environment
    /// overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: SiteConfig =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Pull the API key from the backend's environment variable when the
    /// config file does not set one.
    pub fn apply_env_overrides(&mut self) {
        if self.chat.api_key.is_none()
            && let Some(var) = self.chat.provider.api_key_env()
            && let Ok(key) = std::env::var(var)
            && !key.is_empty()
        {
            self.chat.api_key = Some(key);
        }
    }

    /// Validate settings that would otherwise fail confusingly at
    /// request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be in [0.0, 2.0], got {}",
                self.chat.temperature
            )));
        }
        if self.chat.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be > 0".into()));
        }
        if self.context.max_chars < 100 {
            return Err(ConfigError::Invalid(format!(
                "context.max_chars must be at least 100, got {}",
                self.context.max_chars
            )));
        }
        Ok(())
    }

    /// The API key for the configured backend, if any is required.
    pub fn api_key(&self) -> Option<&str> {
        self.chat.api_key.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = SiteConfig::default();
        assert!(config.chat.enabled);
        assert_eq!(config.chat.provider, ProviderKind::Anthropic);
        assert_eq!(config.chat.default_language, "en");
        assert_eq!(config.context.max_chars, 8_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let config: SiteConfig = toml::from_str(
            r#"
            [chat]
            provider = "openai"
            model = "gpt-4o"
            temperature = 0.3

            [context]
            max_chars = 4000
            "#,
        )
        .unwrap();
        assert_eq!(config.chat.provider, ProviderKind::OpenAi);
        assert_eq!(config.chat.model, "gpt-4o");
        assert_eq!(config.context.max_chars, 4000);
        // Unspecified fields fall back to defaults.
        assert!(config.chat.enabled);
        assert_eq!(config.server.port, 8787);
    }

    #[test]
    fn rejects_bad_temperature() {
        let mut config = SiteConfig::default();
        config.chat.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let mut config = SiteConfig::default();
        config.chat.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [chat]
            provider = "ollama"
            model = "llama3.2"
            "#
        )
        .unwrap();

        let config = SiteConfig::load(file.path()).unwrap();
        assert_eq!(config.chat.provider, ProviderKind::Ollama);
        assert_eq!(config.chat.model, "llama3.2");
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = SiteConfig::default();
        config.chat.api_key = Some("sk-super-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn ollama_needs_no_key_env() {
        assert!(ProviderKind::Ollama.api_key_env().is_none());
        assert_eq!(
            ProviderKind::Anthropic.api_key_env(),
            Some("ANTHROPIC_API_KEY")
        );
    }
}
