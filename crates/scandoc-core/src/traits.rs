use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{Document, Embedding};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must return vectors of one stable dimensionality for the
/// lifetime of the process.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short identifier of the model behind this gateway, used in logs.
    fn model_id(&self) -> &str;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        match out.len() {
            1 => Ok(out.remove(0)),
            n => Err(Error::Embedding(format!("expected 1 embedding, gateway returned {n}"))),
        }
    }
}

/// Language-model completion.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Byte range of the smallest cuttable unit of the text that was tokenized.
///
/// `weight` is the number of model tokens inside the range. It is above 1 when
/// several tokens share one character (byte-fallback pieces), since a chunk
/// boundary can never fall between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
    pub weight: usize,
}

impl TokenSpan {
    /// A span holding exactly one token.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end, weight: 1 }
    }
}

/// Tokenizes text in the same accounting unit the embedding model uses.
///
/// Spans are ordered, non-overlapping and fall on `char` boundaries.
pub trait TokenCounter: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenSpan>>;

    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.tokenize(text)?.iter().map(|s| s.weight).sum())
    }
}

/// Where the raw corpus comes from.
pub trait DocumentSource: Send + Sync {
    fn documents(&self) -> Result<Vec<Document>>;
}

/// Runs one gateway call under `limit`; elapsed time becomes `on_timeout`'s error.
pub async fn with_timeout<T, F>(limit: Duration, call: F, on_timeout: fn(String) -> Error) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(res) => res,
        Err(_) => Err(on_timeout(format!("gateway call timed out after {} ms", limit.as_millis()))),
    }
}

/// Embeds a batch under a deadline and checks the gateway answered once per input.
pub async fn embed_batch_bounded(
    embedder: &dyn Embedder,
    texts: &[String],
    limit: Duration,
) -> Result<Vec<Embedding>> {
    let out = with_timeout(limit, embedder.embed_batch(texts), Error::Embedding).await?;
    if out.len() != texts.len() {
        return Err(Error::Embedding(format!(
            "gateway returned {} embeddings for {} inputs",
            out.len(),
            texts.len()
        )));
    }
    Ok(out)
}
