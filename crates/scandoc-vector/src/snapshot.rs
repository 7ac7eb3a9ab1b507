//! On-disk form of the vector index.
//!
//! One JSON document:
//!
//! ```json
//! { "format": "scandoc-snapshot", "version": 1, "created_at": "...",
//!   "dimension": 384, "checksum": "<blake3 hex>",
//!   "entries": [{ "id": "...", "text": "...", "metadata": {...}, "embedding": [...] }] }
//! ```
//!
//! `checksum` covers the compact serialization of `entries`.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scandoc_core::types::{Chunk, IndexEntry, Meta};
use scandoc_core::{Error, Result};

pub const FORMAT: &str = "scandoc-snapshot";
pub const VERSION: u32 = 1;

#[derive(Serialize)]
struct EntryRef<'a> {
    id: &'a str,
    text: &'a str,
    metadata: &'a Meta,
    embedding: &'a [f32],
}

#[derive(Serialize, Deserialize)]
struct EntryOwned {
    id: String,
    text: String,
    metadata: Meta,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct Header<'a, E> {
    format: &'a str,
    version: u32,
    created_at: DateTime<Utc>,
    dimension: usize,
    checksum: String,
    entries: E,
}

#[derive(Deserialize)]
struct SnapshotDoc {
    format: String,
    version: u32,
    created_at: DateTime<Utc>,
    dimension: usize,
    checksum: String,
    entries: Vec<EntryOwned>,
}

/// A decoded, checksum-verified snapshot.
#[derive(Debug)]
pub struct Snapshot {
    pub created_at: DateTime<Utc>,
    pub dimension: usize,
    pub entries: Vec<IndexEntry>,
}

fn checksum<T: Serialize + ?Sized>(entries: &T) -> Result<String> {
    let bytes = serde_json::to_vec(entries).map_err(|e| Error::InvalidInput(format!("cannot encode entries: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Writes to a temp file next to `path`, syncs it, then renames over `path`.
/// Readers see either the old snapshot or the new one.
pub fn write(path: &Path, dimension: usize, entries: &[IndexEntry]) -> Result<()> {
    let refs: Vec<EntryRef<'_>> = entries
        .iter()
        .map(|e| EntryRef {
            id: &e.chunk.id,
            text: &e.chunk.text,
            metadata: &e.chunk.metadata,
            embedding: &e.embedding,
        })
        .collect();
    let header = Header {
        format: FORMAT,
        version: VERSION,
        created_at: Utc::now(),
        dimension,
        checksum: checksum(&refs)?,
        entries: &refs,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut w, &header).map_err(std::io::Error::from)?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

pub fn read(path: &Path) -> Result<Snapshot> {
    let corrupt = |msg: String| Error::CorruptSnapshot(format!("{}: {}", path.display(), msg));

    let bytes = fs::read(path)?;
    let doc: SnapshotDoc = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    if doc.format != FORMAT {
        return Err(corrupt(format!("unknown format '{}'", doc.format)));
    }
    if doc.version != VERSION {
        return Err(corrupt(format!("unsupported version {}", doc.version)));
    }
    if checksum(&doc.entries)? != doc.checksum {
        return Err(corrupt("checksum mismatch".into()));
    }

    let entries = doc
        .entries
        .into_iter()
        .map(|e| IndexEntry { chunk: Chunk { id: e.id, text: e.text, metadata: e.metadata }, embedding: e.embedding })
        .collect();
    Ok(Snapshot { created_at: doc.created_at, dimension: doc.dimension, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<IndexEntry> {
        let mut metadata = Meta::new();
        metadata.insert("source".into(), "k8s.md".into());
        vec![IndexEntry {
            chunk: Chunk { id: "k8s.md:0".into(), text: "Pods are the smallest deployable units".into(), metadata },
            embedding: vec![0.1, -0.25, 1.0 / 3.0],
        }]
    }

    #[test]
    fn write_then_read_preserves_bits() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/vectorstore.json");
        write(&path, 3, &sample()).unwrap();
        let snap = read(&path).unwrap();
        assert_eq!(snap.dimension, 3);
        assert_eq!(snap.entries, sample());
        // No temp files left behind.
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn tampered_entries_fail_checksum() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vectorstore.json");
        write(&path, 3, &sample()).unwrap();
        let text = fs::read_to_string(&path).unwrap().replace("smallest", "largest");
        fs::write(&path, text).unwrap();
        assert!(matches!(read(&path), Err(Error::CorruptSnapshot(m)) if m.contains("checksum")));
    }

    #[test]
    fn wrong_format_or_version_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vectorstore.json");
        write(&path, 3, &sample()).unwrap();
        let original = fs::read_to_string(&path).unwrap();

        fs::write(&path, original.replace("\"version\":1", "\"version\":9")).unwrap();
        assert!(matches!(read(&path), Err(Error::CorruptSnapshot(m)) if m.contains("version")));

        fs::write(&path, original.replace(FORMAT, "other")).unwrap();
        assert!(matches!(read(&path), Err(Error::CorruptSnapshot(m)) if m.contains("format")));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read(&path), Err(Error::CorruptSnapshot(_))));
    }
}
