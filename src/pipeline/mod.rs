//! Question → validated read-only SQL.
//!
//! ```text
//! question
//!    ↓
//! retrieve        embed, then table index ∥ query-intent index
//!    ↓
//! select_tables   model narrows to the minimal set, tier-biased
//!    ↓
//! narrow          intersect with what was retrieved
//!    ↓
//! generate        tagged <@query@> / <@explanation@> response
//!    ↓
//! parse_response
//!    ↓
//! validate        keywords → statement kind → EXPLAIN
//! ```
//!
//! Each stage waits for the previous one; a failure anywhere aborts the
//! invocation with a [`PipelineError`].

pub mod generate;
pub mod rerank;
pub mod response;
pub mod retrieval;
pub mod validate;

use serde::Serialize;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::db::Database;
use crate::error::PipelineError;
use crate::llm::{Embedder, LanguageModel};
use crate::vector::VectorIndex;
use response::{parse_response, GeneratedArtifact};
use retrieval::{retrieve, RetrievalRequest};
use validate::SqlValidator;

/// A query that passed every validation gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub sql: String,
    /// Tables the query was generated against.
    pub tables: Vec<String>,
}

pub struct SqlPipeline {
    embedder: Arc<dyn Embedder>,
    tables: Arc<dyn VectorIndex>,
    intents: Arc<dyn VectorIndex>,
    model: Arc<dyn LanguageModel>,
    validator: SqlValidator,
    config: PipelineConfig,
}

impl SqlPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        tables: Arc<dyn VectorIndex>,
        intents: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
        db: Arc<dyn Database>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            tables,
            intents,
            model,
            validator: SqlValidator::new(db, config.call_timeout()),
            config,
        }
    }

    #[tracing::instrument(skip(self), fields(dialect = %self.config.dialect))]
    pub async fn ask(&self, question: &str) -> Result<Answer, PipelineError> {
        let timeout = self.config.call_timeout();

        let retrieved = retrieve(
            self.embedder.as_ref(),
            self.tables.as_ref(),
            self.intents.as_ref(),
            RetrievalRequest {
                question,
                table_top_k: self.config.table_top_k,
                intent_top_k: self.config.intent_top_k,
                timeout,
            },
        )
        .await
        .map_err(PipelineError::Retrieval)?;

        let selected = rerank::select_tables(
            self.model.as_ref(),
            question,
            &retrieved.tables,
            &retrieved.intents,
            timeout,
        )
        .await
        .map_err(PipelineError::Rerank)?;
        let narrowed = rerank::narrow(&retrieved.tables, &selected);

        let prompt = generate::build_generation_prompt(
            &self.config.dialect,
            question,
            &narrowed,
            &retrieved.intents,
        );
        let raw = generate::generate(self.model.as_ref(), &prompt, timeout)
            .await
            .map_err(PipelineError::Generation)?;

        let sql = match parse_response(&raw) {
            GeneratedArtifact::Query(sql) => sql,
            GeneratedArtifact::Explanation(text) => {
                tracing::info!(explanation = %text, "model reported insufficient context");
                return Err(PipelineError::InsufficientContext(text));
            }
            GeneratedArtifact::Malformed(raw) => {
                tracing::warn!(response = %raw, "model response had no marker");
                return Err(PipelineError::GenerationFormat { raw });
            }
        };

        let outcome = self.validator.validate(&sql).await;
        if !outcome.valid {
            let reason = outcome
                .error
                .unwrap_or_else(|| "query failed validation".to_string());
            tracing::info!(%reason, "generated query rejected");
            return Err(PipelineError::Validation(reason));
        }

        tracing::info!(tables = ?selected, "generated query validated");
        Ok(Answer {
            sql,
            tables: narrowed.into_iter().map(|t| t.name).collect(),
        })
    }
}
