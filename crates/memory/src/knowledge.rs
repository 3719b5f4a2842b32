//! Knowledge index — chunked knowledge base behind the [`Retriever`] trait.
//!
//! Built once at startup from a plain-text knowledge file:
//!
//! 1. The text is split by [`TextChunker`] along structural separators
//!    (section rules, FAQ questions, list items, headers, paragraphs, lines, words).
//! 2. Chunks are scored per query, either by cosine similarity over provider
//!    embeddings or by keyword overlap.
//! 3. The best `top_k` chunks scoring at least `score_threshold` are returned.

use crate::vector::{cosine_similarity, top_k};
use async_trait::async_trait;
use shopchat_config::{RetrievalConfig, RetrievalMode};
use shopchat_core::error::RetrievalError;
use shopchat_core::provider::{EmbeddingRequest, Provider};
use shopchat_core::retriever::{RetrievedPassage, Retriever};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Separators tried in order when a piece is too long.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n---", "\n\nQ:", "\n-", ":\n", "\n\n", "\n", " "];

/// Chunks embedded per provider call.
const EMBED_BATCH: usize = 64;

/// Recursive separator-based text splitter.
///
/// Lengths are measured in characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    separators: Vec<String>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split `text` into non-empty, trimmed chunks in document order.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let found = separators.iter().position(|s| text.contains(s.as_str()));
        let (pieces, remaining) = match found {
            Some(i) => (
                split_keeping_separator(text, &separators[i]),
                &separators[i + 1..],
            ),
            // No separator left: fall back to single characters.
            None => (text.chars().map(String::from).collect(), &separators[..0]),
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                fitting.push(piece);
            } else {
                if !fitting.is_empty() {
                    chunks.extend(self.merge(&fitting));
                    fitting.clear();
                }
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    /// Greedily pack pieces up to `chunk_size`, carrying up to `chunk_overlap`
    /// characters of trailing pieces into the next chunk.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_chunk(&mut chunks, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        push_chunk(&mut chunks, &window);
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `sep`, attaching each separator to the piece that follows it.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    let mut parts = text.split(sep);
    let mut out = Vec::new();
    if let Some(first) = parts.next()
        && !first.is_empty()
    {
        out.push(first.to_string());
    }
    out.extend(parts.map(|p| format!("{sep}{p}")));
    out
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Retrieval parameters shared by both scoring modes.
#[derive(Debug, Clone, Copy)]
pub struct IndexSettings {
    pub top_k: usize,
    pub score_threshold: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl From<&RetrievalConfig> for IndexSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            score_threshold: config.score_threshold,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

enum Scoring {
    Embedding {
        provider: Arc<dyn Provider>,
        model: String,
        vectors: Vec<Vec<f32>>,
    },
    Keyword {
        lowered: Vec<String>,
    },
}

/// An in-process knowledge index over one source document.
pub struct KnowledgeIndex {
    source: String,
    chunks: Vec<String>,
    settings: IndexSettings,
    scoring: Scoring,
}

impl KnowledgeIndex {
    /// Build a keyword-scored index. Makes no provider calls.
    pub fn keyword(
        source: impl Into<String>,
        text: &str,
        settings: IndexSettings,
    ) -> Result<Self, RetrievalError> {
        let source = source.into();
        let chunks = chunk_document(&source, text, &settings)?;
        let lowered = chunks.iter().map(|c| c.to_lowercase()).collect();
        info!(source = %source, chunks = chunks.len(), mode = "keyword", "Knowledge base loaded");
        Ok(Self {
            source,
            chunks,
            settings,
            scoring: Scoring::Keyword { lowered },
        })
    }

    /// Build an embedding-scored index, embedding every chunk once.
    pub async fn embedding(
        source: impl Into<String>,
        text: &str,
        settings: IndexSettings,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Result<Self, RetrievalError> {
        let source = source.into();
        let model = model.into();
        let chunks = chunk_document(&source, text, &settings)?;

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let response = provider
                .embed(EmbeddingRequest {
                    model: model.clone(),
                    inputs: batch.to_vec(),
                })
                .await
                .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;
            vectors.extend(response.embeddings);
        }
        if vectors.len() != chunks.len() {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                vectors.len()
            )));
        }

        info!(source = %source, chunks = chunks.len(), model = %model, mode = "embedding", "Knowledge base loaded");
        Ok(Self {
            source,
            chunks,
            settings,
            scoring: Scoring::Embedding {
                provider,
                model,
                vectors,
            },
        })
    }

    /// Read the knowledge file at `path` and build the index in the configured mode.
    pub async fn from_file(
        path: &Path,
        config: &RetrievalConfig,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, RetrievalError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::IndexUnavailable(format!("Failed to read {}: {e}", path.display()))
        })?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let settings = IndexSettings::from(config);
        match config.mode {
            RetrievalMode::Keyword => Self::keyword(source, &text, settings),
            RetrievalMode::Embedding => {
                Self::embedding(source, &text, settings, provider, &config.embedding_model).await
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn passages(&self, scored: Vec<(f32, usize)>) -> Vec<RetrievedPassage> {
        top_k(scored, self.settings.top_k, self.settings.score_threshold)
            .into_iter()
            .map(|(score, i)| {
                RetrievedPassage::new(self.chunks[i].clone(), score)
                    .with_metadata("source", self.source.clone())
                    .with_metadata("chunk_index", i)
            })
            .collect()
    }
}

fn chunk_document(
    source: &str,
    text: &str,
    settings: &IndexSettings,
) -> Result<Vec<String>, RetrievalError> {
    let chunks = TextChunker::new(settings.chunk_size, settings.chunk_overlap).split(text);
    if chunks.is_empty() {
        return Err(RetrievalError::IndexUnavailable(format!(
            "Knowledge base {source} is empty"
        )));
    }
    Ok(chunks)
}

/// Distinct lowercase query terms of three or more characters.
fn query_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .filter(|t| seen.insert(t.to_string()))
        .map(String::from)
        .collect()
}

#[async_trait]
impl Retriever for KnowledgeIndex {
    fn name(&self) -> &str {
        match self.scoring {
            Scoring::Embedding { .. } => "embedding",
            Scoring::Keyword { .. } => "keyword",
        }
    }

    async fn query(&self, text: &str) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let scored: Vec<(f32, usize)> = match &self.scoring {
            Scoring::Embedding {
                provider,
                model,
                vectors,
            } => {
                let response = provider
                    .embed(EmbeddingRequest {
                        model: model.clone(),
                        inputs: vec![text.to_string()],
                    })
                    .await
                    .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;
                let query = response.embeddings.into_iter().next().ok_or_else(|| {
                    RetrievalError::EmbeddingFailed("No embedding returned for query".into())
                })?;
                vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (cosine_similarity(&query, v), i))
                    .collect()
            }
            Scoring::Keyword { lowered } => {
                let terms = query_terms(text);
                if terms.is_empty() {
                    return Ok(Vec::new());
                }
                lowered
                    .iter()
                    .enumerate()
                    .map(|(i, chunk)| {
                        let hits = terms.iter().filter(|t| chunk.contains(t.as_str())).count();
                        (hits as f32 / terms.len() as f32, i)
                    })
                    .collect()
            }
        };

        let passages = self.passages(scored);
        debug!(retriever = self.name(), hits = passages.len(), "Knowledge query complete");
        Ok(passages)
    }
}
