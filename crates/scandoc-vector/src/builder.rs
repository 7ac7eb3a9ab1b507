use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use scandoc_core::chunker::Chunker;
use scandoc_core::traits::{embed_batch_bounded, DocumentSource, Embedder};
use scandoc_core::types::{Chunk, IndexEntry};
use scandoc_core::{Error, Result};

use crate::index::VectorIndex;

/// What startup did to get a ready index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupReport {
    Loaded { entries: usize },
    Built { documents: usize, chunks: usize, dropped_tokens: usize },
}

#[derive(Debug)]
enum Stage {
    CheckSnapshot,
    Load,
    Build,
    Ready(VectorIndex, StartupReport),
}

/// Loads the persisted index, or builds and persists it when none exists.
///
/// An existing snapshot is never rebuilt: a corrupt one fails startup with
/// `CorruptSnapshot` and the file is left for inspection. A build only writes
/// the snapshot after every chunk is embedded and indexed.
pub struct IndexBuilder {
    snapshot_path: PathBuf,
    source: Arc<dyn DocumentSource>,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    timeout: Duration,
    progress: bool,
}

impl IndexBuilder {
    pub fn new(
        snapshot_path: impl Into<PathBuf>,
        source: Arc<dyn DocumentSource>,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            source,
            chunker,
            embedder,
            batch_size: 32,
            timeout: Duration::from_secs(30),
            progress: false,
        }
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    /// Upper bound on each embedding gateway call.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = limit;
        self
    }

    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn snapshot_path(&self) -> &Path { &self.snapshot_path }

    pub async fn run(&self) -> Result<(VectorIndex, StartupReport)> {
        let mut stage = Stage::CheckSnapshot;
        loop {
            stage = match stage {
                Stage::CheckSnapshot => {
                    if self.snapshot_path.exists() {
                        info!(path = %self.snapshot_path.display(), "snapshot found");
                        Stage::Load
                    } else {
                        info!(path = %self.snapshot_path.display(), "no snapshot, building index from corpus");
                        Stage::Build
                    }
                }
                Stage::Load => {
                    let index = VectorIndex::open(&self.snapshot_path)?;
                    let entries = index.len();
                    Stage::Ready(index, StartupReport::Loaded { entries })
                }
                Stage::Build => {
                    let (index, report) = self.build().await?;
                    index.save(&self.snapshot_path)?;
                    Stage::Ready(index, report)
                }
                Stage::Ready(index, report) => {
                    info!(?report, entries = index.len(), "index ready");
                    return Ok((index, report));
                }
            };
        }
    }

    async fn build(&self) -> Result<(VectorIndex, StartupReport)> {
        let docs = self.source.documents()?;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut dropped_tokens = 0usize;
        for doc in &docs {
            let split = self.chunker.split_document(doc)?;
            debug!(source = %doc.source, chunks = split.chunks.len(), "split document");
            dropped_tokens += split.dropped_tokens;
            chunks.extend(split.chunks);
        }
        if chunks.is_empty() {
            return Err(Error::InvalidInput("corpus produced no chunks to index".into()));
        }
        info!(documents = docs.len(), chunks = chunks.len(), dropped_tokens, "corpus chunked");

        let pb = if self.progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("embedding with {}", self.embedder.model_id()));

        let mut entries: Vec<IndexEntry> = Vec::with_capacity(chunks.len());
        let total = chunks.len();
        let mut pending = chunks.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(self.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = match embed_batch_bounded(self.embedder.as_ref(), &texts, self.timeout).await {
                Ok(e) => e,
                Err(e) => {
                    pb.abandon_with_message("embedding failed");
                    return Err(e);
                }
            };
            entries.extend(batch.into_iter().zip(embeddings).map(|(chunk, embedding)| IndexEntry { chunk, embedding }));
            pb.set_position(entries.len() as u64);
            debug!(embedded = entries.len(), total, "embedded batch");
        }
        pb.finish_and_clear();

        let mut index = VectorIndex::new();
        index.add(entries)?;
        Ok((index, StartupReport::Built { documents: docs.len(), chunks: total, dropped_tokens }))
    }
}
