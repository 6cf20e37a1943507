//! Core domain types and traits for SiteChat.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//! conversation turns, the provider abstraction over LLM backends, the
//! stream frame wire types, and the error taxonomy. It performs no I/O
//! itself.

pub mod error;
pub mod frame;
pub mod message;
pub mod provider;

pub use error::{ChatError, Error, ProviderError, Result};
pub use frame::StreamFrame;
pub use message::{ChatTurn, Role};
pub use provider::{ChatCompletion, ChatProvider, ChatRequest, StreamChunk};
