use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;

use super::{cosine_similarity, RetrievalMatch, VectorIndex, VectorRecord};

/// In-process collection with cosine similarity search and optional JSON
/// persistence. Upserts replace entries with the same id in place.
#[derive(Default)]
pub struct MemoryIndex {
    records: RwLock<Vec<VectorRecord>>,
    persist_path: Option<PathBuf>,
    /// Held across an upsert and its file write so writes land in order.
    write_lock: Mutex<()>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a persisted collection, or start an empty one at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read vector file: {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("Corrupt vector file: {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self {
            records: RwLock::new(records),
            persist_path: Some(path.to_path_buf()),
            write_lock: Mutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records sorted by id.
    pub fn snapshot(&self) -> Vec<VectorRecord> {
        let mut records = self.read().clone();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        self.read().iter().find(|r| r.id == id).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<VectorRecord>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn persist(&self, records: &[VectorRecord]) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = serde_json::to_string(records)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write to a temp file and rename so a crash never leaves half a file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("Failed to write vector file: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>> {
        let records = self.read();
        let mut scored: Vec<(f32, &VectorRecord)> = records
            .iter()
            .map(|r| (cosine_similarity(vector, &r.values), r))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, r)| RetrievalMatch {
                metadata: r.metadata.clone(),
                score,
            })
            .collect())
    }

    async fn upsert(&self, incoming: Vec<VectorRecord>) -> Result<()> {
        let _writer = self.write_lock.lock().await;
        let snapshot = {
            let mut records = self
                .records
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for record in incoming {
                match records.iter_mut().find(|r| r.id == record.id) {
                    Some(existing) => *existing = record,
                    None => records.push(record),
                }
            }
            records.clone()
        };
        self.persist(&snapshot).await
    }
}
