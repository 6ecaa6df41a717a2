use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

use super::types::{ChatRequest, ChatResponse, Message};
use super::CompletionModel;

pub const DEFAULT_BASE_URL: &str = "https://models.inference.ai.azure.com";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Near-deterministic extraction
const TEMPERATURE: f32 = 0.1;

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiCompatClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, "Chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .context("LLM request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM API error ({}): {}", status, error_text));
        }

        response
            .json()
            .await
            .context("Failed to decode LLM response")
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: TEMPERATURE,
        };

        self.chat(&request)
            .await?
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No completion in LLM response"))
    }
}
