use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;

use super::curated::{merge, CuratedSource};
use super::{embed_and_upsert, summarize, JobProgress, JobReport, JobRun};
use crate::db::{group_columns, Database, IntrospectedTable};
use crate::error::with_timeout;
use crate::llm::{Embedder, LanguageModel};
use crate::models::TableDescriptor;
use crate::vector::VectorIndex;

/// Introspect → summarize → merge curated metadata → embed → upsert into
/// the table index. Entries are keyed by table name, so repeated runs over
/// an unchanged database rewrite the same ids.
pub struct SchemaSync {
    db: Arc<dyn Database>,
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    curated: CuratedSource,
    timeout: Duration,
}

impl SchemaSync {
    pub fn new(
        db: Arc<dyn Database>,
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        curated: CuratedSource,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            model,
            embedder,
            index,
            curated,
            timeout,
        }
    }

    pub async fn run(&self) -> JobReport {
        let run = JobRun::start("schema");
        let mut progress = JobProgress::default();
        let result = self.sync(&mut progress).await;
        run.finish(progress, result)
    }

    async fn sync(&self, progress: &mut JobProgress) -> Result<()> {
        let columns = with_timeout("table introspection", self.timeout, async {
            Ok(self.db.table_columns().await?)
        })
        .await
        .context("Failed to introspect tables")?;
        let tables = group_columns(&columns);
        progress.discovered = tables.len();
        tracing::debug!(tables = tables.len(), "introspected schema");

        let curated = self.curated.load()?;

        let summaries = try_join_all(tables.iter().map(|t| {
            summarize(self.model.as_ref(), summary_prompt(t), self.timeout)
        }))
        .await
        .context("Failed to summarize tables")?;

        for (table, summary) in tables.into_iter().zip(summaries) {
            let entry = curated.get(&table.name);
            let descriptor = merge(table, summary, entry);
            self.upsert(&descriptor).await?;
            progress.upserted += 1;
        }
        Ok(())
    }

    async fn upsert(&self, table: &TableDescriptor) -> Result<()> {
        embed_and_upsert(
            self.embedder.as_ref(),
            self.index.as_ref(),
            table.name.clone(),
            &table.summary,
            table.to_metadata(),
            self.timeout,
        )
        .await
        .with_context(|| format!("Failed to upsert table {}", table.name))?;
        tracing::debug!(table = %table.name, tier = %table.tier, "table upserted");
        Ok(())
    }
}

fn summary_prompt(table: &IntrospectedTable) -> String {
    format!(
        "Describe the business purpose of the database table \"{}\" in one sentence.\n\
         Columns: {}\n\
         Respond with the sentence only.",
        table.name, table.schema
    )
}
