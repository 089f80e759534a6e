//! Ollama generator provider.
//!
//! Ollama exposes an OpenAI-compatible API at localhost:11434/v1; one
//! non-streaming chat completion per call is all this subsystem needs.

use crate::generator::Generator;
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryConfig,
}

impl OllamaGenerator {
    pub fn new(model: &str, base_url: Option<&str>) -> Result<Self> {
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| env::var("OLLAMA_BASE_URL").ok())
            .unwrap_or_else(|| "http://localhost:11434/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            base_url,
            model: model.to_string(),
            max_tokens: 512,
            temperature: 0.7,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "max_tokens": max_tokens,
            "stream": false,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = with_retry(&self.retry, "Ollama", || async {
            self.client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;

        let body: Value = response
            .json()
            .await
            .context("Failed to parse Ollama response body")?;
        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .context("Ollama response missing message content")?
            .trim()
            .to_string();
        Ok(text)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String> {
        self.chat(context, prompt, self.max_tokens).await
    }

    async fn classify_boolean(&self, prompt: &str) -> Result<bool> {
        let system = "Answer with a single word, yes or no. No punctuation, no explanation.";
        let answer = self.chat(system, prompt, 8).await?;
        Ok(answer.to_lowercase().starts_with("yes"))
    }
}
