//! Query path: embed the question, retrieve the nearest chunks, bind them
//! into a prompt and ask the language model.

pub mod prompt;
pub mod retriever;
pub mod service;

pub use prompt::{assemble, PromptTemplate, DEFAULT_TEMPLATE};
pub use retriever::Retriever;
pub use service::QueryService;
