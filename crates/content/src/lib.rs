//! Content source contract and grounding-context assembly.
//!
//! The chat subsystem answers with site-specific facts by feeding the
//! model a bounded slice of site content. This crate owns the read-only
//! view of that content: the source contract, the HTML-to-plain-text
//! normalization, and the scorer that picks which items fit the budget.

pub mod assembler;
pub mod html;
pub mod source;

pub use assembler::{ContextAssembler, truncate};
pub use source::{
    ContentError, ContentItem, ContentKind, ContentSource, JsonFileSource, Priority, StaticSource,
};
