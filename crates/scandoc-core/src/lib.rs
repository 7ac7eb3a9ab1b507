//! Shared building blocks of the scandoc retrieval service: domain types, the
//! error taxonomy, gateway traits, layered configuration, token accounting,
//! the chunker and the on-disk corpus reader.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod tokenize;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
