//! Retriever trait — the knowledge-base capability consumed by the core.
//!
//! Given a query string, a retriever returns scored passages that already
//! cleared its relevance threshold, best first. An empty list is a valid,
//! non-error outcome.

use crate::error::RetrievalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A scored unit of knowledge. Produced fresh per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// The passage text
    pub content: String,

    /// Relevance score (higher is more relevant)
    pub score: f32,

    /// Opaque source metadata (file name, chunk index, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RetrievedPassage {
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            score,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// The retriever name (e.g., "embedding", "keyword").
    fn name(&self) -> &str;

    /// Return passages relevant to `text`, in retriever order.
    async fn query(&self, text: &str) -> Result<Vec<RetrievedPassage>, RetrievalError>;
}
