//! Built-in token accounting.
//!
//! `WordTokenizer` approximates a sub-word vocabulary: every run of
//! alphanumeric characters is one token and every other non-whitespace
//! character is a token on its own. It needs no model files, so it is the
//! default counter paired with the hashing embedder.

use crate::error::Result;
use crate::traits::{TokenCounter, TokenSpan};

#[derive(Debug, Default, Clone, Copy)]
pub struct WordTokenizer;

impl WordTokenizer {
    pub fn new() -> Self { Self }
}

impl TokenCounter for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenSpan>> {
        let mut spans = Vec::new();
        let mut word_start: Option<usize> = None;
        for (i, ch) in text.char_indices() {
            if ch.is_alphanumeric() {
                if word_start.is_none() { word_start = Some(i); }
                continue;
            }
            if let Some(start) = word_start.take() {
                spans.push(TokenSpan::new(start, i));
            }
            if !ch.is_whitespace() {
                spans.push(TokenSpan::new(i, i + ch.len_utf8()));
            }
        }
        if let Some(start) = word_start {
            spans.push(TokenSpan::new(start, text.len()));
        }
        Ok(spans)
    }
}
