//! Concrete gateways behind the scandoc traits, selected from `GatewaySettings`.

use std::sync::Arc;

use tracing::info;

use scandoc_core::config::{EmbedderKind, GatewaySettings, GeneratorKind, TokenizerKind};
use scandoc_core::tokenize::WordTokenizer;
use scandoc_core::traits::{Embedder, Generator, TokenCounter};
use scandoc_core::{Error, Result};

pub mod echo;
pub mod hash;
pub mod ollama;
pub mod tokenize;

pub use echo::EchoGenerator;
pub use hash::HashEmbedder;
pub use ollama::{OllamaEmbedder, OllamaGenerator};
pub use tokenize::HfTokenCounter;

pub fn embedder_from_settings(settings: &GatewaySettings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.embedder {
        EmbedderKind::Hash => Arc::new(HashEmbedder::new(settings.hash_dimension)),
        EmbedderKind::Ollama => Arc::new(OllamaEmbedder::new(
            &settings.base_url,
            &settings.embedding_model,
            settings.timeout(),
        )?),
    };
    info!(model = embedder.model_id(), "embedding gateway ready");
    Ok(embedder)
}

pub fn generator_from_settings(settings: &GatewaySettings) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match settings.generator {
        GeneratorKind::Echo => Arc::new(EchoGenerator),
        GeneratorKind::Ollama => Arc::new(OllamaGenerator::new(
            &settings.base_url,
            &settings.completion_model,
            settings.timeout(),
        )?),
    };
    info!(model = generator.model_id(), "completion gateway ready");
    Ok(generator)
}

pub fn token_counter_from_settings(settings: &GatewaySettings) -> Result<Arc<dyn TokenCounter>> {
    match settings.tokenizer {
        TokenizerKind::Word => Ok(Arc::new(WordTokenizer::new())),
        TokenizerKind::Huggingface => {
            let path = settings
                .tokenizer_path
                .as_deref()
                .ok_or_else(|| Error::InvalidConfig("gateway.tokenizer_path is not set".into()))?;
            Ok(Arc::new(HfTokenCounter::from_file(path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_settings_build_offline_gateways() {
        let settings = GatewaySettings::default();
        let embedder = embedder_from_settings(&settings).unwrap();
        assert_eq!(embedder.model_id(), "hash:d384");
        assert_eq!(embedder.embed("A Service exposes Pods").await.unwrap().len(), 384);

        let generator = generator_from_settings(&settings).unwrap();
        assert_eq!(generator.complete("ping").await.unwrap(), "ping");

        let tokens = token_counter_from_settings(&settings).unwrap();
        assert_eq!(tokens.count("What exposes Pods?").unwrap(), 4);
    }

    #[test]
    fn huggingface_without_path_is_config_error() {
        let settings = GatewaySettings { tokenizer: TokenizerKind::Huggingface, ..Default::default() };
        assert!(matches!(token_counter_from_settings(&settings), Err(Error::InvalidConfig(_))));
    }
}
