use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

use scandoc_core::chunker::{Chunker, ChunkingConfig, OverflowPolicy};
use scandoc_core::corpus::FileCorpus;
use scandoc_core::tokenize::WordTokenizer;
use scandoc_core::traits::{DocumentSource, TokenCounter};
use scandoc_core::types::{META_CHUNK_INDEX, META_SOURCE, META_TOTAL_CHUNKS};
use scandoc_core::Error;

fn chunker(config: ChunkingConfig) -> Chunker {
    Chunker::new(config, Arc::new(WordTokenizer))
}

#[test]
fn corpus_single_small_file_is_one_chunk() {
    let tmp = TempDir::new().unwrap();
    let file_path = tmp.path().join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let docs = FileCorpus::new(tmp.path(), vec!["txt".into()]).documents().expect("read");
    let split = chunker(ChunkingConfig::default()).split_document(&docs[0]).expect("split");

    assert_eq!(split.chunks.len(), 1, "one small paragraph becomes one chunk");
    let chunk = &split.chunks[0];
    assert_eq!(chunk.text, "Short text");
    assert_eq!(chunk.id, "a.txt:0");
    assert_eq!(chunk.metadata[META_SOURCE], "a.txt");
    assert_eq!(chunk.metadata[META_CHUNK_INDEX], "0");
    assert_eq!(chunk.metadata[META_TOTAL_CHUNKS], "1");
    assert_eq!(chunk.metadata["filename"], "a.txt");
}

#[test]
fn chunking_a_directory_is_deterministic_and_bounded() {
    let tmp = TempDir::new().unwrap();
    let body: String = (0..40).map(|i| format!("Sentence number {i} talks about Pods and Services. ")).collect();
    fs::write(tmp.path().join("a.md"), &body).unwrap();
    fs::write(tmp.path().join("b.md"), body.replace("Pods", "Nodes")).unwrap();

    let config = ChunkingConfig { chunk_size: 32, min_chunk_chars: 50, ..Default::default() };
    let corpus = FileCorpus::new(tmp.path(), vec!["md".into()]);
    let run = || {
        let c = chunker(config.clone());
        corpus
            .documents()
            .unwrap()
            .iter()
            .flat_map(|d| c.split_document(d).unwrap().chunks)
            .collect::<Vec<_>>()
    };
    let first = run();
    assert_eq!(first, run(), "same input gives the same chunks");

    let tokens = WordTokenizer;
    for chunk in &first {
        assert!(tokens.count(&chunk.text).unwrap() <= 32, "chunk {} is over budget", chunk.id);
    }
    let sources: std::collections::HashSet<_> = first.iter().filter_map(|c| c.source()).collect();
    assert_eq!(sources.len(), 2);
}

#[test]
fn overflow_policy_is_explicit() {
    let text: String = (0..100).map(|i| format!("w{i} ")).collect();
    let truncate = chunker(ChunkingConfig { chunk_size: 10, max_chunks: 3, ..Default::default() });
    let doc = scandoc_core::types::Document::new("long.txt", text.clone());
    let split = truncate.split_document(&doc).unwrap();
    assert_eq!(split.chunks.len(), 3);
    assert_eq!(split.dropped_tokens, 70);
    assert!(split.is_truncated());

    let reject = chunker(ChunkingConfig {
        chunk_size: 10,
        max_chunks: 3,
        overflow: OverflowPolicy::Reject,
        ..Default::default()
    });
    assert!(matches!(reject.split_document(&doc), Err(Error::InvalidInput(_))));
}
