use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use std::sync::Arc;
use tracing::info;

const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// The opaque text-completion capability the agents build on. Implementations
/// must be safe to call concurrently; failures are handled by the callers'
/// template fallbacks.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u64) -> anyhow::Result<String>;
}

/// Generator backed by an OpenRouter-hosted model via rig
pub struct OpenRouterGenerator {
    api_key: String,
    model: String,
}

impl OpenRouterGenerator {
    pub fn new(api_key: String, model: String) -> Self {
        Self { api_key, model }
    }
}

#[async_trait]
impl Generator for OpenRouterGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u64) -> anyhow::Result<String> {
        let client = openrouter::Client::new(&self.api_key);
        let agent = client
            .agent(&self.model)
            .temperature(0.7)
            .max_tokens(max_tokens)
            .build();

        let response = agent.prompt(prompt).await?;
        Ok(response)
    }
}

/// Build a generator from the environment, or `None` to run on the template
/// fallbacks alone.
pub fn generator_from_env() -> Option<Arc<dyn Generator>> {
    match std::env::var("OPENROUTER_API_KEY") {
        Ok(api_key) if !api_key.is_empty() => {
            let model =
                std::env::var("CONSULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
            info!(model = %model, "using OpenRouter text generation");
            Some(Arc::new(OpenRouterGenerator::new(api_key, model)))
        }
        _ => None,
    }
}
