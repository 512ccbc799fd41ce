//! Scripted adapters shared by the integration tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pgrag::db::{ColumnRecord, Database, DbError};
use pgrag::llm::{Embedder, LanguageModel};
use pgrag::models::TableDescriptor;
use pgrag::vector::{MemoryIndex, VectorIndex, VectorRecord};

const VOCABULARY: [&str; 6] = ["lead", "ticket", "order", "customer", "invoice", "created"];

/// Bag-of-words over a tiny vocabulary, plus a constant so no vector is zero.
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lowered = text.to_lowercase();
        let mut v: Vec<f32> = VOCABULARY
            .iter()
            .map(|w| lowered.matches(w).count() as f32)
            .collect();
        v.push(0.1);
        Ok(v)
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding service unavailable")
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// A model whose reply is computed from the prompt. Every prompt is kept.
pub struct ScriptedModel {
    respond: Responder,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(respond: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer table selection with `selection` and generation with `generation`.
    pub fn pipeline(selection: &str, generation: &str) -> Self {
        let selection = selection.to_string();
        let generation = generation.to_string();
        Self::new(move |prompt| {
            if prompt.starts_with("You select database tables") {
                Ok(selection.clone())
            } else if prompt.starts_with("You write") {
                Ok(generation.clone())
            } else {
                anyhow::bail!("unexpected prompt: {prompt}")
            }
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.respond)(prompt)
    }
}

/// In-memory stand-in for PostgreSQL.
#[derive(Default)]
pub struct StubDatabase {
    pub columns: Vec<ColumnRecord>,
    pub queries: Vec<String>,
    pub explain_error: Option<String>,
    pub explain_calls: AtomicUsize,
    pub explained: Mutex<Vec<String>>,
    /// Every call sleeps this long first.
    pub delay: Option<Duration>,
}

impl StubDatabase {
    pub fn explain_count(&self) -> usize {
        self.explain_calls.load(Ordering::SeqCst)
    }

    async fn stall(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Database for StubDatabase {
    async fn table_columns(&self) -> Result<Vec<ColumnRecord>, DbError> {
        self.stall().await;
        Ok(self.columns.clone())
    }

    async fn frequent_queries(&self, limit: usize) -> Result<Vec<String>, DbError> {
        self.stall().await;
        Ok(self.queries.iter().take(limit).cloned().collect())
    }

    async fn explain(&self, sql: &str) -> Result<(), DbError> {
        self.explain_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        self.explained.lock().unwrap().push(sql.to_string());
        match &self.explain_error {
            Some(msg) => Err(DbError::connection(msg.clone())),
            None => Ok(()),
        }
    }

    async fn read_rows(&self, _sql: &str) -> Result<Vec<Map<String, Value>>, DbError> {
        Ok(Vec::new())
    }
}

/// Upserts succeed until `fail_after` records have been written.
pub struct FlakyIndex {
    pub inner: MemoryIndex,
    pub fail_after: usize,
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<pgrag::vector::RetrievalMatch>> {
        self.inner.query(vector, top_k).await
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if self.inner.len() >= self.fail_after {
            anyhow::bail!("vector store rejected write");
        }
        self.inner.upsert(records).await
    }
}

pub fn lead_table() -> TableDescriptor {
    TableDescriptor {
        name: "lead".to_string(),
        schema: "id integer, createdAt timestamp".to_string(),
        tier: pgrag::models::Tier::Gold,
        domain: "Sales".to_string(),
        summary: "Inbound sales leads with their creation time.".to_string(),
        extra: Default::default(),
    }
}

/// A table index holding `tables`, embedded with [`KeywordEmbedder`].
pub async fn table_index(tables: &[TableDescriptor]) -> Arc<MemoryIndex> {
    let index = MemoryIndex::new();
    for t in tables {
        let values = KeywordEmbedder.embed(&t.summary).await.unwrap();
        index
            .upsert(vec![VectorRecord {
                id: t.name.clone(),
                values,
                metadata: t.to_metadata(),
            }])
            .await
            .unwrap();
    }
    Arc::new(index)
}
