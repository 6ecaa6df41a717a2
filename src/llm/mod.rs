pub mod client;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use client::OpenAiCompatClient;

/// A chat model that turns one user prompt into one text completion
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
