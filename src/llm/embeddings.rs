use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{error_for_status, Embedder, Provider};
use crate::config::EmbeddingConfig;

/// Maximum characters sent per text. Summaries are short; this only guards
/// against oversized inputs such as very long questions.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    provider: Provider,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: Option<usize>,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client,
            provider: config.provider.parse()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimensions: config.dimensions,
        })
    }

    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>> {
        let req = OllamaEmbedRequest {
            model: &self.model,
            input: vec![text],
            truncate: true,
        };
        let resp = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama embed API")?;
        let body: OllamaEmbedResponse = error_for_status(resp, "Ollama embed API")
            .await?
            .json()
            .await
            .context("Failed to parse Ollama embed response")?;
        body.embeddings
            .into_iter()
            .next()
            .context("No embedding returned")
    }

    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>> {
        let req = OpenAiEmbedRequest {
            model: &self.model,
            input: vec![text],
        };
        let mut builder = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&req);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .await
            .context("Failed to call OpenAI embeddings API")?;
        let body: OpenAiEmbedResponse = error_for_status(resp, "OpenAI embeddings API")
            .await?
            .json()
            .await
            .context("Failed to parse OpenAI embeddings response")?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("No embedding returned")
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = truncate_for_embedding(text);
        let vector = match self.provider {
            Provider::Ollama => self.embed_ollama(text).await?,
            Provider::OpenAi => self.embed_openai(text).await?,
        };
        check_dimensions(&vector, self.dimensions)?;
        Ok(vector)
    }
}

fn check_dimensions(vector: &[f32], expected: Option<usize>) -> Result<()> {
    match expected {
        Some(dim) if vector.len() != dim => anyhow::bail!(
            "Embedding has {} dimensions, expected {}",
            vector.len(),
            dim
        ),
        _ => Ok(()),
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    /// Ask Ollama to truncate inputs longer than the model context.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}
