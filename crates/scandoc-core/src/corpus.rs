use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::DocumentSource;
use crate::types::Document;

pub const META_FILENAME: &str = "filename";

/// Raw-text corpus on disk: a single file, or a directory walked recursively.
///
/// Files are visited in path order so chunk ids are stable between builds.
#[derive(Debug, Clone)]
pub struct FileCorpus {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FileCorpus {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self { root: root.into(), extensions }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn list_files(&self) -> Result<Vec<PathBuf>> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        if !self.root.is_dir() {
            return Err(Error::InvalidInput(format!("corpus path {} does not exist", self.root.display())));
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let at = e.path().map(|p| p.display().to_string()).unwrap_or_else(|| self.root.display().to_string());
                Error::InvalidInput(format!("cannot walk corpus at {}: {}", at, e))
            })?;
            if !entry.file_type().is_file() { continue; }
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
            if self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    fn source_id(&self, file: &Path) -> String {
        let rel = if self.root.is_file() {
            file.file_name().map(PathBuf::from).unwrap_or_else(|| file.to_path_buf())
        } else {
            file.strip_prefix(&self.root).unwrap_or(file).to_path_buf()
        };
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl DocumentSource for FileCorpus {
    fn documents(&self) -> Result<Vec<Document>> {
        let files = self.list_files()?;
        if files.is_empty() {
            return Err(Error::InvalidInput(format!("no corpus files under {}", self.root.display())));
        }
        let mut docs = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            debug!("Reading file {}/{}: {}", i + 1, files.len(), file.display());
            let bytes = fs::read(file)
                .map_err(|e| Error::InvalidInput(format!("cannot read {}: {}", file.display(), e)))?;
            let text = String::from_utf8(bytes)
                .map_err(|_| Error::InvalidInput(format!("{} is not valid UTF-8 text", file.display())))?;
            let filename = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            docs.push(Document::new(self.source_id(file), text).with_metadata(META_FILENAME, filename));
        }
        info!(documents = docs.len(), root = %self.root.display(), "read corpus");
        Ok(docs)
    }
}
