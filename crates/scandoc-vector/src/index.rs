use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use scandoc_core::types::{ChunkId, Embedding, IndexEntry, RetrievalResult, ScoredChunk};
use scandoc_core::{Error, Result};

use crate::snapshot;

/// Flat cosine-similarity index over chunk embeddings.
///
/// Every entry has the same dimensionality, fixed by the first non-empty `add`.
/// Insertion order is kept and used to break score ties. Queries are a linear
/// scan with a bounded heap, O(n log k).
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
    ids: HashSet<ChunkId>,
    dim: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Established dimensionality, `None` until something was added.
    pub fn dim(&self) -> Option<usize> { self.dim }

    pub fn entries(&self) -> &[IndexEntry] { &self.entries }

    pub fn contains(&self, id: &str) -> bool { self.ids.contains(id) }

    /// Adds a batch. Nothing is inserted unless every entry is valid.
    pub fn add(&mut self, batch: Vec<IndexEntry>) -> Result<()> {
        if batch.is_empty() { return Ok(()); }
        let expected = match self.dim {
            Some(d) => d,
            None => batch[0].embedding.len(),
        };
        let mut seen: HashSet<&str> = HashSet::with_capacity(batch.len());
        for entry in &batch {
            if entry.embedding.is_empty() {
                return Err(Error::InvalidInput(format!("chunk '{}' has an empty embedding", entry.chunk.id)));
            }
            if entry.embedding.len() != expected {
                return Err(Error::DimensionMismatch { expected, actual: entry.embedding.len() });
            }
            if entry.embedding.iter().any(|x| !x.is_finite()) {
                return Err(Error::InvalidInput(format!("chunk '{}' has a non-finite embedding value", entry.chunk.id)));
            }
            if !norm(&entry.embedding).is_finite() {
                return Err(Error::InvalidInput(format!("chunk '{}' has an embedding whose norm overflows", entry.chunk.id)));
            }
            if self.ids.contains(&entry.chunk.id) || !seen.insert(entry.chunk.id.as_str()) {
                return Err(Error::DuplicateChunk(entry.chunk.id.clone()));
            }
        }

        self.dim = Some(expected);
        self.entries.reserve(batch.len());
        for entry in batch {
            self.norms.push(norm(&entry.embedding));
            self.ids.insert(entry.chunk.id.clone());
            self.entries.push(entry);
        }
        debug!(entries = self.entries.len(), dim = expected, "index grew");
        Ok(())
    }

    /// The `k` entries most similar to `query`, best first.
    ///
    /// `k` larger than the index returns every entry, ranked.
    pub fn similarity_search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        let dim = match self.dim {
            Some(d) if !self.entries.is_empty() => d,
            _ => return Err(Error::EmptyIndex),
        };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidInput("query embedding has a non-finite value".into()));
        }
        let qnorm = norm(query);
        if !qnorm.is_finite() {
            return Err(Error::InvalidInput("query embedding norm overflows".into()));
        }
        if k == 0 { return Ok(RetrievalResult::default()); }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        for (seq, (entry, n)) in self.entries.iter().zip(&self.norms).enumerate() {
            let score = cosine(query, qnorm, &entry.embedding, *n);
            heap.push(Candidate { score, seq });
            if heap.len() > k { heap.pop(); }
        }

        let hits = heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| ScoredChunk { chunk: self.entries[c.seq].chunk.clone(), score: c.score })
            .collect();
        Ok(RetrievalResult { hits })
    }

    /// Writes a snapshot of every entry; atomic with respect to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        snapshot::write(path, self.dim.unwrap_or(0), &self.entries)?;
        info!(path = %path.display(), entries = self.entries.len(), "saved index snapshot");
        Ok(())
    }

    /// Replaces the whole index with the snapshot at `path`.
    ///
    /// On any error the current contents are left untouched.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        *self = Self::open(path)?;
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self> {
        let snap = snapshot::read(path)?;
        let mut index = Self::new();
        index.add(snap.entries).map_err(|e| Error::CorruptSnapshot(format!("{}: {}", path.display(), e)))?;
        if !index.is_empty() && index.dim != Some(snap.dimension) {
            return Err(Error::CorruptSnapshot(format!(
                "{}: header says dimension {}, entries have {}",
                path.display(),
                snap.dimension,
                index.dim.unwrap_or(0)
            )));
        }
        info!(path = %path.display(), entries = index.len(), dim = snap.dimension, "loaded index snapshot");
        Ok(index)
    }
}

/// Heap element ordered so the heap's maximum is the weakest candidate:
/// lower score first, then later insertion.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    seq: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Candidate {}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Zero-magnitude vectors score 0.
fn cosine(a: &[f32], a_norm: f32, b: &Embedding, b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 { return 0.0; }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scandoc_core::types::{Chunk, Meta};

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry { chunk: Chunk { id: id.into(), text: format!("text of {id}"), metadata: Meta::new() }, embedding }
    }

    fn ids(result: &RetrievalResult) -> Vec<&str> {
        result.chunks().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn ranks_by_cosine_and_caps_at_k() {
        let mut index = VectorIndex::new();
        index
            .add(vec![
                entry("a", vec![1.0, 0.0]),
                entry("b", vec![0.0, 1.0]),
                entry("c", vec![0.7, 0.7]),
            ])
            .unwrap();

        let top = index.similarity_search(&[1.0, 0.1], 2).unwrap();
        assert_eq!(ids(&top), vec!["a", "c"]);
        assert!(top.hits[0].score >= top.hits[1].score);

        let all = index.similarity_search(&[1.0, 0.1], 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(ids(&all), vec!["a", "c", "b"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = VectorIndex::new();
        index
            .add(vec![entry("first", vec![0.0, 1.0]), entry("second", vec![0.0, 2.0]), entry("third", vec![0.0, 3.0])])
            .unwrap();
        let top = index.similarity_search(&[0.0, 5.0], 2).unwrap();
        assert_eq!(ids(&top), vec!["first", "second"]);
    }

    #[test]
    fn zero_vectors_score_zero() {
        let mut index = VectorIndex::new();
        index.add(vec![entry("z", vec![0.0, 0.0])]).unwrap();
        let top = index.similarity_search(&[1.0, 1.0], 1).unwrap();
        assert_eq!(top.hits[0].score, 0.0);
        let top = index.similarity_search(&[0.0, 0.0], 1).unwrap();
        assert_eq!(top.hits[0].score, 0.0);
    }

    #[test]
    fn add_is_all_or_nothing() {
        let mut index = VectorIndex::new();
        index.add(vec![entry("a", vec![1.0, 0.0])]).unwrap();

        let err = index.add(vec![entry("b", vec![1.0, 0.0]), entry("c", vec![1.0])]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));
        assert_eq!(index.len(), 1);
        assert!(!index.contains("b"));

        let err = index.add(vec![entry("d", vec![0.5, 0.5]), entry("a", vec![0.0, 1.0])]).unwrap_err();
        assert!(matches!(err, Error::DuplicateChunk(id) if id == "a"));
        let err = index.add(vec![entry("e", vec![0.5, 0.5]), entry("e", vec![0.0, 1.0])]).unwrap_err();
        assert!(matches!(err, Error::DuplicateChunk(_)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn rejects_degenerate_vectors() {
        let mut index = VectorIndex::new();
        assert!(matches!(index.add(vec![entry("a", vec![])]), Err(Error::InvalidInput(_))));
        assert!(matches!(index.add(vec![entry("a", vec![f32::NAN, 1.0])]), Err(Error::InvalidInput(_))));
        assert_eq!(index.dim(), None);
    }

    #[test]
    fn overflowing_norms_are_rejected() {
        let mut index = VectorIndex::new();
        let err = index.add(vec![entry("huge", vec![1e20, 1e20])]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m.contains("huge")), "{err}");
        assert!(index.is_empty());

        index.add(vec![entry("a", vec![1.0, 0.0])]).unwrap();
        assert!(matches!(index.similarity_search(&[1e20, 1e20], 1), Err(Error::InvalidInput(_))));
        let top = index.similarity_search(&[1e10, 0.0], 1).unwrap();
        assert!((top.hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ragged_snapshot_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("v.json");
        snapshot::write(&path, 2, &[entry("a", vec![1.0, 0.0]), entry("b", vec![1.0, 0.0, 0.0])]).unwrap();
        let err = VectorIndex::open(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptSnapshot(ref m) if m.contains("Dimension mismatch")), "{err}");
    }

    #[test]
    fn header_dimension_must_match_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("v.json");
        snapshot::write(&path, 4, &[entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])]).unwrap();

        let mut index = VectorIndex::new();
        index.add(vec![entry("kept", vec![1.0])]).unwrap();
        let err = index.load(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptSnapshot(ref m) if m.contains("dimension 4")), "{err}");
        assert!(index.contains("kept"));
    }

    #[test]
    fn query_errors() {
        let empty = VectorIndex::new();
        assert!(matches!(empty.similarity_search(&[1.0], 1), Err(Error::EmptyIndex)));

        let mut index = VectorIndex::new();
        index.add(vec![entry("a", vec![1.0, 0.0, 0.0])]).unwrap();
        assert!(matches!(
            index.similarity_search(&[1.0, 0.0], 1),
            Err(Error::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(index.similarity_search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }
}
