//! LLM client for extracting structured facts from unstructured page text.
//!
//! Wraps a Gemini-compatible `generateContent` endpoint; used by the
//! sponsor and brand enrichers to turn scraped page content into
//! structured lists.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_VAR: &str = "GOOGLE_GENERATIVE_AI_API_KEY";

const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Configuration for the LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// generateContent endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Temperature for generation (kept low: extraction, not prose).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens in the response.
    #[serde(default = "default_max_tokens")]
    pub max_output_tokens: u32,
    /// Maximum characters of page content to send per request.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_max_content_chars() -> usize {
    15_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_output_tokens: default_max_tokens(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

/// Client for a Gemini-style generateContent API.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, config: LlmConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build LLM HTTP client")?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// Truncate content to the configured cap, marking the cut.
    pub fn clip_content(&self, content: &str) -> String {
        if content.chars().count() <= self.config.max_content_chars {
            return content.to_string();
        }
        let clipped: String = content.chars().take(self.config.max_content_chars).collect();
        format!("{clipped}\n...[truncated]")
    }

    /// Send a prompt and return the model's text response.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            },
        });

        let response = self
            .client
            .post(format!("{}?key={}", self.config.endpoint, self.api_key))
            .json(&payload)
            .send()
            .await
            .context("LLM request failed")?
            .error_for_status()
            .context("LLM request returned an error status")?;

        let body: Value = response.json().await.context("invalid LLM response body")?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("LLM response missing candidate text"))?;

        debug!(chars = text.len(), "LLM response received");
        Ok(text.to_string())
    }

    /// Send a prompt and parse the response as JSON, tolerating markdown
    /// code fences around the payload.
    pub async fn generate_json(&self, prompt: &str) -> Result<Value> {
        let text = self.generate(prompt).await?;
        extract_json(&text).ok_or_else(|| anyhow!("LLM response was not valid JSON"))
    }
}

/// Parse JSON out of a model response, stripping ```-fences if present.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let body = if trimmed.starts_with("```") {
        trimmed
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        trimmed.to_string()
    };
    serde_json::from_str(body.trim()).ok()
}
