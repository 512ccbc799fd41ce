use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::{AppConfig, IndexConfig, VectorConfig};
use crate::db::{Database, PgDatabase};
use crate::llm::{http_client, ChatModel, Embedder, HttpEmbedder, LanguageModel};
use crate::pipeline::SqlPipeline;
use crate::sync::{CuratedSource, QueryLogSync, SchemaSync};
use crate::vector::{MemoryIndex, PineconeIndex, VectorIndex};

/// Adapters built once from configuration and shared by the pipeline and
/// both sync jobs.
pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<dyn Database>,
    pub model: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
    pub tables: Arc<dyn VectorIndex>,
    pub queries: Arc<dyn VectorIndex>,
}

impl AppState {
    /// No network traffic happens here; the pool connects on first use.
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = http_client()?;
        let db = PgDatabase::connect(&config.database).context("Failed to set up database pool")?;
        let model = ChatModel::new(client.clone(), &config.llm).context("Invalid [llm] config")?;
        let embedder = HttpEmbedder::new(client.clone(), &config.embedding)
            .context("Invalid [embedding] config")?;
        let tables = open_index(&client, &config.vector, &config.vector.tables, "tables")?;
        let queries = open_index(&client, &config.vector, &config.vector.queries, "queries")?;

        tracing::debug!(
            database = %config.database.display_string(),
            llm = %config.llm.provider,
            vector = %config.vector.provider,
            "adapters ready"
        );

        Ok(Self {
            db: Arc::new(db),
            model: Arc::new(model),
            embedder: Arc::new(embedder),
            tables,
            queries,
            config,
        })
    }

    pub fn pipeline(&self) -> SqlPipeline {
        SqlPipeline::new(
            self.embedder.clone(),
            self.tables.clone(),
            self.queries.clone(),
            self.model.clone(),
            self.db.clone(),
            self.config.pipeline.clone(),
        )
    }

    pub fn schema_sync(&self) -> SchemaSync {
        SchemaSync::new(
            self.db.clone(),
            self.model.clone(),
            self.embedder.clone(),
            self.tables.clone(),
            CuratedSource::from_path(self.config.sync.curated_metadata.clone()),
            self.config.pipeline.call_timeout(),
        )
    }

    pub fn query_log_sync(&self) -> QueryLogSync {
        QueryLogSync::new(
            self.db.clone(),
            self.model.clone(),
            self.embedder.clone(),
            self.queries.clone(),
            self.config.sync.query_log_limit,
            self.config.pipeline.call_timeout(),
        )
    }
}

fn open_index(
    client: &reqwest::Client,
    vector: &VectorConfig,
    index: &IndexConfig,
    collection: &str,
) -> Result<Arc<dyn VectorIndex>> {
    match vector.provider.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            let path = vector.data_dir.join(format!("{collection}.json"));
            Ok(Arc::new(MemoryIndex::open(&path)?))
        }
        "pinecone" => {
            if index.host.is_empty() {
                anyhow::bail!("vector.{collection}.host is required for the pinecone provider");
            }
            let api_key = vector
                .api_key
                .as_deref()
                .with_context(|| "vector.api_key (or VECTOR_API_KEY) is required for pinecone")?;
            Ok(Arc::new(PineconeIndex::new(
                client.clone(),
                &index.host,
                api_key,
                index.namespace.clone(),
            )))
        }
        other => anyhow::bail!("Unknown vector provider: {other}"),
    }
}
