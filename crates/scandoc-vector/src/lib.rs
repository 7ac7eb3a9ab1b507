//! In-memory vector index with a durable JSON snapshot, and the startup
//! builder that either loads that snapshot or builds it from the corpus.

pub mod builder;
pub mod index;
pub mod snapshot;

pub use builder::{IndexBuilder, StartupReport};
pub use index::VectorIndex;
