use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Metadata, RetrievalMatch, VectorIndex, VectorRecord};

/// A Pinecone index (or namespace within one) over its data-plane HTTP API.
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    pub fn new(
        client: reqwest::Client,
        host: &str,
        api_key: &str,
        namespace: Option<String>,
    ) -> Self {
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };
        Self {
            client,
            host,
            api_key: api_key.to_string(),
            namespace,
        }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.host, path);
        let resp = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to call vector store at {url}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Vector store returned {status}: {body}");
        }
        Ok(resp)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

/// Flatten store metadata to strings; numbers and booleans keep their
/// JSON spelling.
fn flatten_metadata(raw: BTreeMap<String, serde_json::Value>) -> Metadata {
    raw.into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect()
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>> {
        let req = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };
        let body: QueryResponse = self
            .post("/query", &req)
            .await?
            .json()
            .await
            .context("Failed to parse vector store query response")?;

        Ok(body
            .matches
            .into_iter()
            .take(top_k)
            .map(|m| RetrievalMatch {
                metadata: flatten_metadata(m.metadata),
                score: m.score,
            })
            .collect())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let req = UpsertRequest {
            vectors: &records,
            namespace: self.namespace.as_deref(),
        };
        self.post("/vectors/upsert", &req).await?;
        Ok(())
    }
}
