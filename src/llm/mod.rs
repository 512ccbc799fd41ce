//! Language model and embedding adapters.
//!
//! Both are provider-agnostic traits; `ChatModel` and `HttpEmbedder` speak
//! to Ollama or any OpenAI-compatible endpoint.

mod chat;
mod embeddings;

pub use chat::ChatModel;
pub use embeddings::HttpEmbedder;

use anyhow::Result;
use async_trait::async_trait;

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Returns a completion for a single prompt. No memory across calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String>;
}

/// Provider wire formats supported by the HTTP adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAi,
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAi),
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
    }
}

/// Shared HTTP client for model, embedding and vector store calls.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .timeout(std::time::Duration::from_secs(120))
        .build()?)
}

async fn error_for_status(resp: reqwest::Response, api: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{api} returned {status}: {body}")
}
