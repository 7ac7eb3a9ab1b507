use std::path::Path;

use tokenizers::Tokenizer;

use scandoc_core::traits::{TokenCounter, TokenSpan};
use scandoc_core::{Error, Result};

/// Token accounting with the embedding model's own HuggingFace tokenizer.
///
/// Tokens whose offsets overlap (byte-fallback pieces of one character) are
/// merged into one span whose `weight` is the number of tokens merged, since a
/// chunk boundary can never fall between them. Tokens with empty offsets are
/// counted on the following span.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_file(path)
            .map_err(|e| Error::InvalidConfig(format!("Failed to load tokenizer from {}: {}", path.display(), e)))?;
        // Counting must see the whole document, not the model's input window.
        let _ = tokenizer.with_truncation(None);
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HfTokenCounter {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenSpan>> {
        let enc = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::InvalidInput(format!("Tokenization failed: {}", e)))?;
        let mut spans: Vec<TokenSpan> = Vec::with_capacity(enc.get_offsets().len());
        // Tokens with empty offsets still cost budget; they ride on the next span.
        let mut pending = 0usize;
        for &(start, end) in enc.get_offsets() {
            if start >= end {
                pending += 1;
                continue;
            }
            if end > text.len() || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
                return Err(Error::InvalidInput(format!("tokenizer produced offsets {start}..{end} outside the text")));
            }
            let weight = 1 + std::mem::take(&mut pending);
            match spans.last_mut() {
                Some(prev) if start < prev.end => {
                    prev.end = prev.end.max(end);
                    prev.weight += weight;
                }
                _ => spans.push(TokenSpan { start, end, weight }),
            }
        }
        if let Some(last) = spans.last_mut() {
            last.weight += pending;
        }
        Ok(spans)
    }
}
