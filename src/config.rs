use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::ConnectionConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: ConnectionConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
    pub pipeline: PipelineConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    pub base_url: String,
    pub chat_model: String,
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "ollama" or "openai"
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Expected vector length. Responses of any other length are rejected.
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            dimensions: Some(768),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// "pinecone" or "memory"
    pub provider: String,
    pub api_key: Option<String>,
    pub tables: IndexConfig,
    pub queries: IndexConfig,
    /// Where the in-memory provider persists its collections.
    pub data_dir: PathBuf,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            api_key: None,
            tables: IndexConfig {
                host: String::new(),
                namespace: Some("tables".to_string()),
            },
            queries: IndexConfig {
                host: String::new(),
                namespace: Some("queries".to_string()),
            },
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pgrag"),
        }
    }
}

/// One logical collection in the vector store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub host: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dialect: String,
    pub table_top_k: usize,
    pub intent_top_k: usize,
    pub call_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dialect: "PostgreSQL".to_string(),
            table_top_k: 5,
            intent_top_k: 3,
            call_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub query_log_limit: usize,
    /// TOML or JSON file of curated per-table metadata.
    pub curated_metadata: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            query_log_limit: 100,
            curated_metadata: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pgrag")
            .join("config.toml")
    }

    /// Load from `path`, or the default location when `None`. A missing
    /// file yields defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Invalid config file: {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(pw) = std::env::var("PGPASSWORD") {
            self.database.password = pw;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("VECTOR_API_KEY") {
            self.vector.api_key = Some(key);
        }
    }
}
