//! Ollama-compatible HTTP gateway for embeddings (`/api/embed`) and
//! completion (`/api/generate`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scandoc_core::traits::{Embedder, Generator};
use scandoc_core::types::Embedding;
use scandoc_core::{Error, Result};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Clone)]
struct Endpoint {
    client: Client,
    base_url: String,
}

impl Endpoint {
    fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// POST `body` as JSON; any transport, status or decoding failure goes through `fail`.
    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
        fail: fn(String) -> Error,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| fail(format!("request to {} failed: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(fail(format!("{} returned {}: {}", url, status, text)));
        }
        response
            .json::<R>()
            .await
            .map_err(|e| fail(format!("malformed response from {}: {}", url, e)))
    }
}

pub struct OllamaEmbedder {
    endpoint: Endpoint,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { endpoint: Endpoint::new(base_url, timeout)?, model: model.to_string() })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> &str { &self.model }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let body = EmbedRequest { model: &self.model, input: texts };
        let out: EmbedResponse = self.endpoint.post("/api/embed", &body, Error::Embedding).await?;
        if out.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                out.embeddings.len()
            )));
        }
        let dim = out.embeddings[0].len();
        if dim == 0 || out.embeddings.iter().any(|e| e.len() != dim) {
            return Err(Error::Embedding("gateway returned empty or ragged embeddings".into()));
        }
        debug!(model = %self.model, batch = texts.len(), dim, "embedded batch");
        Ok(out.embeddings)
    }
}

pub struct OllamaGenerator {
    endpoint: Endpoint,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { endpoint: Endpoint::new(base_url, timeout)?, model: model.to_string() })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str { &self.model }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest { model: &self.model, prompt, stream: false };
        let out: GenerateResponse = self.endpoint.post("/api/generate", &body, Error::Generation).await?;
        Ok(out.response)
    }
}
