use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate chunk id: {0}")]
    DuplicateChunk(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Index is not ready")]
    NotReady,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors that only fail the current request.
    ///
    /// Everything else (bad config, corrupt snapshot, dimension drift, I/O)
    /// means the process cannot serve and must halt startup.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EmptyIndex
                | Error::Embedding(_)
                | Error::Generation(_)
                | Error::NotReady
                | Error::InvalidInput(_)
                | Error::Template(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
