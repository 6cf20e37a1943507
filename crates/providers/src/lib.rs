//! LLM backend adapters for SiteChat.
//!
//! One adapter per backend, all implementing the same `ChatProvider`
//! contract from `sitechat-core`:
//!
//! - [`AnthropicProvider`] — Anthropic Messages API (native)
//! - [`OpenAiProvider`] — OpenAI and any compatible endpoint
//! - [`GeminiProvider`] — Google Gemini generateContent API
//! - [`OllamaProvider`] — local models via Ollama's native API
//!
//! Selection is a pure mapping from the configured provider kind; see
//! [`factory::build_provider`]. Configuration errors (missing
//! credential, unknown kind) fail there, before any network call.

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use factory::{build_provider, default_model, resolve_model};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
