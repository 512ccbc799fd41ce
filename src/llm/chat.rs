use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{error_for_status, LanguageModel, Provider};
use crate::config::LlmConfig;

/// Chat completion client pinned to temperature zero so table summaries and
/// generated SQL are reproducible.
pub struct ChatModel {
    client: reqwest::Client,
    provider: Provider,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatModel {
    pub fn new(client: reqwest::Client, config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client,
            provider: config.provider.parse()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn call_ollama(&self, prompt: &str) -> Result<String> {
        let req = OllamaChatRequest {
            model: &self.model,
            messages: vec![Message::user(prompt)],
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
        };
        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama chat API")?;
        let body: OllamaChatResponse = error_for_status(resp, "Ollama chat API")
            .await?
            .json()
            .await
            .context("Failed to parse Ollama chat response")?;
        Ok(body.message.content)
    }

    async fn call_openai(&self, prompt: &str) -> Result<String> {
        let req = OpenAiChatRequest {
            model: &self.model,
            messages: vec![Message::user(prompt)],
            temperature: 0.0,
        };
        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&req);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .await
            .context("Failed to call OpenAI chat API")?;
        let body: OpenAiChatResponse = error_for_status(resp, "OpenAI chat API")
            .await?
            .json()
            .await
            .context("Failed to parse OpenAI chat response")?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("OpenAI chat response had no choices")
    }
}

#[async_trait]
impl LanguageModel for ChatModel {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        match self.provider {
            Provider::Ollama => self.call_ollama(prompt).await,
            Provider::OpenAi => self.call_openai(prompt).await,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Message,
}
