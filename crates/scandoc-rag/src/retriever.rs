use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use scandoc_core::traits::{with_timeout, Embedder};
use scandoc_core::types::RetrievalResult;
use scandoc_core::{Error, Result};
use scandoc_vector::VectorIndex;

/// Embeds a query and ranks index entries against it. Cheap to clone.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    timeout: Duration,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index, timeout: Duration::from_secs(30), similarity_threshold: None }
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = limit;
        self
    }

    /// Hits scoring below `threshold` are dropped after ranking.
    pub fn similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn index(&self) -> &VectorIndex { &self.index }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query is empty".into()));
        }
        let embedding = with_timeout(self.timeout, self.embedder.embed(query), Error::Embedding).await?;
        // A wrong-sized query vector is a gateway fault, not index corruption.
        let mut result = self.index.similarity_search(&embedding, k).map_err(|e| match e {
            Error::DimensionMismatch { expected, actual } => Error::Embedding(format!(
                "query embedding has {actual} dimensions, index has {expected}"
            )),
            other => other,
        })?;
        if let Some(min) = self.similarity_threshold {
            result.hits.retain(|h| h.score >= min);
        }
        debug!(k, hits = result.len(), top = ?result.hits.first().map(|h| h.score), "retrieved");
        Ok(result)
    }
}
