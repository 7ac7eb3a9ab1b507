//! Domain types shared by the chunker, the vector index and the query path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ChunkId = String;
pub type Embedding = Vec<f32>;

/// Chunk metadata. Ordered so snapshots serialize deterministically.
pub type Meta = BTreeMap<String, String>;

pub const META_SOURCE: &str = "source";
pub const META_CHUNK_INDEX: &str = "chunk_index";
pub const META_TOTAL_CHUNKS: &str = "total_chunks";

/// One raw resource of the corpus.
///
/// `metadata` is copied onto every chunk produced from this document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub text: String,
    pub metadata: Meta,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source: source.into(), text: text.into(), metadata: Meta::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bounded fragment of a source document, the unit of indexing and retrieval.
///
/// - `id`: `"<source>:<chunk_index>"`
/// - `text`: the exact (trimmed) slice of the source text
/// - `metadata`: always carries `source`, `chunk_index` and `total_chunks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub metadata: Meta,
}

impl Chunk {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// A chunk paired with its cosine similarity to the query. Higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks ranked by descending similarity, at most `k` long.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|h| &h.chunk)
    }

    /// Chunk texts in ranked order.
    pub fn texts(&self) -> Vec<String> {
        self.chunks().map(|c| c.text.clone()).collect()
    }
}

/// The language-model input for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentedPrompt {
    pub question: String,
    pub context: Vec<String>,
    /// `question` and `context` bound into the template.
    pub text: String,
}

/// Inbound query body: `{ "message": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub message: String,
}

/// Outbound answer body: `{ "answer": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
}
