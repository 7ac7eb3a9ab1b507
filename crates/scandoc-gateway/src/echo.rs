use async_trait::async_trait;

use scandoc_core::traits::Generator;
use scandoc_core::Result;

/// Answers with the prompt it was given. Lets the whole pipeline run without a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    fn model_id(&self) -> &str { "echo" }

    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}
