use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use scandoc_core::traits::{with_timeout, Embedder, Generator};
use scandoc_core::types::{AugmentedPrompt, QueryRequest, QueryResponse, RetrievalResult};
use scandoc_core::{Error, Result};
use scandoc_vector::{IndexBuilder, StartupReport, VectorIndex};

use crate::prompt::{assemble, PromptTemplate};
use crate::retriever::Retriever;

/// Answers `{ message }` with `{ answer }`: retrieve, assemble, complete.
///
/// Queries fail with `NotReady` until an index has been installed, either by
/// `start` or `install`. After that the index is read-only and shared by all
/// concurrent queries.
pub struct QueryService {
    ready: OnceCell<Retriever>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    top_k: usize,
    timeout: Duration,
    similarity_threshold: Option<f32>,
}

impl QueryService {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, template: PromptTemplate) -> Self {
        Self {
            ready: OnceCell::new(),
            embedder,
            generator,
            template,
            top_k: 2,
            timeout: Duration::from_secs(30),
            similarity_threshold: None,
        }
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Upper bound on each gateway call made while answering.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = limit;
        self
    }

    pub fn similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn is_ready(&self) -> bool { self.ready.initialized() }

    /// Runs startup (load or build) and opens the service for queries.
    pub async fn start(&self, builder: &IndexBuilder) -> Result<StartupReport> {
        let (index, report) = builder.run().await?;
        self.install(Arc::new(index))?;
        Ok(report)
    }

    pub fn install(&self, index: Arc<VectorIndex>) -> Result<()> {
        let entries = index.len();
        let retriever = Retriever::new(self.embedder.clone(), index)
            .timeout(self.timeout)
            .similarity_threshold(self.similarity_threshold);
        self.ready
            .set(retriever)
            .map_err(|_| Error::InvalidConfig("an index is already installed".into()))?;
        info!(entries, top_k = self.top_k, "query service ready");
        Ok(())
    }

    fn retriever(&self) -> Result<&Retriever> {
        self.ready.get().ok_or(Error::NotReady)
    }

    /// Retrieval only; `k` defaults to the configured top-k.
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<RetrievalResult> {
        self.retriever()?.retrieve(query, k.unwrap_or(self.top_k)).await
    }

    /// Retrieval and prompt assembly, without calling the language model.
    pub async fn prompt(&self, question: &str, k: Option<usize>) -> Result<AugmentedPrompt> {
        let retrieved = self.search(question, k).await?;
        Ok(assemble(question, &retrieved, &self.template))
    }

    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<String> {
        let prompt = self.prompt(question, k).await?;
        with_timeout(self.timeout, self.generator.complete(&prompt.text), Error::Generation).await
    }

    pub async fn handle(&self, request: QueryRequest) -> Result<QueryResponse> {
        match self.ask(&request.message, None).await {
            Ok(answer) => Ok(QueryResponse { answer }),
            Err(e) => {
                warn!(error = %e, recoverable = e.is_recoverable(), "query failed");
                Err(e)
            }
        }
    }
}
