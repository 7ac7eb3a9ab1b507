use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::{TokenCounter, TokenSpan};
use crate::types::{Chunk, Document, Meta, META_CHUNK_INDEX, META_SOURCE, META_TOTAL_CHUNKS};

/// What happens when a document would produce more than `max_chunks` chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Keep the first `max_chunks` chunks; the rest is reported in `Split::dropped_tokens`.
    #[default]
    Truncate,
    /// Fail the split with `InvalidInput` when text that would be indexed is
    /// left over. A trailing remainder too short to embed does not count.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on tokens per chunk.
    pub chunk_size: usize,
    /// Upper bound on chunks per document.
    pub max_chunks: usize,
    /// A window is only cut back to a sentence end if it keeps more than this many chars.
    pub min_chunk_chars: usize,
    /// Chunks whose trimmed text is not longer than this are discarded.
    pub min_chunk_length_to_embed: usize,
    pub overflow: OverflowPolicy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            max_chunks: 256,
            min_chunk_chars: 350,
            min_chunk_length_to_embed: 5,
            overflow: OverflowPolicy::Truncate,
        }
    }
}

/// Result of splitting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub chunks: Vec<Chunk>,
    /// Model tokens of chunks that were not kept because `max_chunks` was reached.
    pub dropped_tokens: usize,
}

impl Split {
    pub fn is_truncated(&self) -> bool { self.dropped_tokens > 0 }
}

/// Token-window splitter that prefers sentence and line boundaries.
///
/// Boundaries always fall between tokens of the configured `TokenCounter`, and
/// the same input always yields the same chunks.
pub struct Chunker {
    config: ChunkingConfig,
    tokens: Arc<dyn TokenCounter>,
}

/// End (exclusive) of the widest window from `pos` whose weights fit in `budget`.
///
/// A single span heavier than the budget still forms a window of its own: it
/// cannot be cut.
fn window_end(spans: &[TokenSpan], pos: usize, budget: usize) -> usize {
    let mut end = pos + 1;
    let mut used = spans[pos].weight;
    while end < spans.len() && used + spans[end].weight <= budget {
        used += spans[end].weight;
        end += 1;
    }
    end
}

impl Chunker {
    pub fn new(config: ChunkingConfig, tokens: Arc<dyn TokenCounter>) -> Self {
        Self { config, tokens }
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Split raw text with explicit bounds; other knobs come from the config.
    pub fn split(&self, text: &str, source_id: &str, chunk_size: usize, max_chunks: usize) -> Result<Vec<Chunk>> {
        Ok(self.split_with(text, source_id, &Meta::new(), chunk_size, max_chunks)?.chunks)
    }

    /// Split a corpus document using the configured bounds.
    pub fn split_document(&self, doc: &Document) -> Result<Split> {
        self.split_with(&doc.text, &doc.source, &doc.metadata, self.config.chunk_size, self.config.max_chunks)
    }

    fn split_with(&self, text: &str, source: &str, metadata: &Meta, chunk_size: usize, max_chunks: usize) -> Result<Split> {
        if chunk_size == 0 || max_chunks == 0 {
            return Err(Error::InvalidInput("chunk_size and max_chunks must be positive".into()));
        }
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(format!("document '{source}' is empty")));
        }
        let spans = self.tokens.tokenize(text)?;

        let mut pieces: Vec<&str> = Vec::new();
        let mut dropped_tokens = 0usize;
        let mut pos = 0usize;
        while pos < spans.len() {
            let mut end = window_end(&spans, pos, chunk_size);
            if end < spans.len() {
                if let Some(cut) = self.sentence_cut(text, &spans[pos..end]) {
                    end = pos + cut;
                }
            }
            let piece = text[spans[pos].start..spans[end - 1].end].trim();
            if piece.chars().count() > self.config.min_chunk_length_to_embed {
                if pieces.len() < max_chunks {
                    pieces.push(piece);
                } else {
                    // Only text that would have been indexed counts as dropped.
                    dropped_tokens += spans[pos..end].iter().map(|s| s.weight).sum::<usize>();
                }
            }
            pos = end;
        }

        if dropped_tokens > 0 {
            match self.config.overflow {
                OverflowPolicy::Truncate => warn!(
                    source,
                    max_chunks,
                    dropped_tokens,
                    "document exceeds max_chunks; trailing text not indexed"
                ),
                OverflowPolicy::Reject => {
                    return Err(Error::InvalidInput(format!(
                        "document '{source}' needs more than {max_chunks} chunks of {chunk_size} tokens"
                    )))
                }
            }
        }

        let total = pieces.len();
        let chunks = pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let mut meta = metadata.clone();
                meta.insert(META_SOURCE.to_string(), source.to_string());
                meta.insert(META_CHUNK_INDEX.to_string(), i.to_string());
                meta.insert(META_TOTAL_CHUNKS.to_string(), total.to_string());
                Chunk { id: format!("{}:{}", source, i), text: piece.to_string(), metadata: meta }
            })
            .collect::<Vec<_>>();
        debug!(source, tokens = spans.len(), chunks = chunks.len(), "split document");
        Ok(Split { chunks, dropped_tokens })
    }

    /// Length of the window prefix ending at its last sentence or line break,
    /// if that prefix is longer than `min_chunk_chars`.
    fn sentence_cut(&self, text: &str, window: &[TokenSpan]) -> Option<usize> {
        let last = (0..window.len()).rev().find(|&j| {
            let tok = &text[window[j].start..window[j].end];
            let ends_sentence = tok.ends_with(|c: char| matches!(c, '.' | '!' | '?'));
            let line_break = window
                .get(j + 1)
                .is_some_and(|next| text[window[j].end..next.start].contains('\n'));
            ends_sentence || line_break
        })?;
        let kept = text[window[0].start..window[last].end].chars().count();
        (kept > self.config.min_chunk_chars).then_some(last + 1)
    }
}
