//! OpenAI-compatible chat completions client.

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::env;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use ragdb_core::config::GenerationSettings;
use ragdb_core::traits::Generator;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

/// Blocking chat completions client. The bearer key is read once from the
/// environment variable named by `generation.api_key_env`.
pub struct ChatCompletionGenerator {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

impl ChatCompletionGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let api_key = env::var(&settings.api_key_env).unwrap_or_default();
        if api_key.is_empty() {
            warn!(var = %settings.api_key_env, "generation api key not set; answers will report an error");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            top_p: settings.top_p,
        })
    }

    pub fn model(&self) -> &str { &self.model }
}

impl Generator for ChatCompletionGenerator {
    fn complete(&self, system_instruction: &str, user_prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("no api key configured for {}", self.api_url);
        }
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system_instruction },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        };
        let response = self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            bail!("API error {status}: {snippet}");
        }

        let data: serde_json::Value = response.json().context("invalid chat completion body")?;
        let text = extract_content(&data)?;
        debug!(model = %self.model, elapsed_ms = start.elapsed().as_millis() as u64, "chat completion done");
        Ok(text)
    }
}

/// `choices[0].message.content` of a chat completion response.
pub fn extract_content(data: &serde_json::Value) -> Result<String> {
    data.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("response has no choices[0].message.content"))
}
