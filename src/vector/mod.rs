//! Vector store collections: the table index and the query-intent index.

mod memory;
mod pinecone;

pub use memory::MemoryIndex;
pub use pinecone::PineconeIndex;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata attached to every stored vector.
pub type Metadata = BTreeMap<String, String>;

/// One entry to write, keyed by a stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Metadata,
}

/// A nearest-neighbour hit. Higher scores are more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalMatch {
    pub metadata: Metadata,
    pub score: f32,
}

/// A single logical collection supporting upsert-by-id and top-K lookup.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// At most `top_k` matches, most similar first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>>;

    /// Insert or replace records by id.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
