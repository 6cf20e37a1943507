//! The content source contract.
//!
//! Content storage and markdown rendering live outside this subsystem;
//! we consume already-rendered items as read-only snapshots, one full
//! corpus read per request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// What kind of content unit an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Page,
    Blog,
}

impl ContentKind {
    /// Label used in the rendered context block.
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Page => "Page",
            ContentKind::Blog => "Blog post",
        }
    }
}

/// Editorial priority of a content item. High-priority items are always
/// included in the grounding context; the rest compete on score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// One content unit, as delivered by the external content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub title: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Rendered body. May still contain HTML; the assembler normalizes.
    pub body: String,
}

/// Errors from a content source read.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Failed to read corpus file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse corpus file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A function returning all indexable content items.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn load_all(&self) -> Result<Vec<ContentItem>, ContentError>;
}

#[async_trait]
impl<S: ContentSource + ?Sized> ContentSource for std::sync::Arc<S> {
    async fn load_all(&self) -> Result<Vec<ContentItem>, ContentError> {
        (**self).load_all().await
    }
}

/// An in-memory content source, used in tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    items: Vec<ContentItem>,
}

impl StaticSource {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn load_all(&self) -> Result<Vec<ContentItem>, ContentError> {
        Ok(self.items.clone())
    }
}

/// A content source backed by a JSON file of items, re-read on every
/// request so edits show up without a restart.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentSource for JsonFileSource {
    async fn load_all(&self) -> Result<Vec<ContentItem>, ContentError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ContentError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        serde_json::from_str(&raw).map_err(|source| ContentError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }
}
