use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::sanitize::sanitize_query;
use super::{embed_and_upsert, summarize, JobProgress, JobReport, JobRun};
use crate::db::Database;
use crate::error::with_timeout;
use crate::llm::{Embedder, LanguageModel};
use crate::models::QueryIntentRecord;
use crate::vector::VectorIndex;

/// Frequent queries → sanitize → summarize intent → embed → upsert into the
/// query-intent index, keyed by a hash of the sanitized text.
pub struct QueryLogSync {
    db: Arc<dyn Database>,
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    limit: usize,
    timeout: Duration,
}

impl QueryLogSync {
    pub fn new(
        db: Arc<dyn Database>,
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            model,
            embedder,
            index,
            limit,
            timeout,
        }
    }

    pub async fn run(&self) -> JobReport {
        let run = JobRun::start("query_log");
        let mut progress = JobProgress::default();
        let result = self.sync(&mut progress).await;
        run.finish(progress, result)
    }

    async fn sync(&self, progress: &mut JobProgress) -> Result<()> {
        let raw = with_timeout("query statistics read", self.timeout, async {
            Ok(self.db.frequent_queries(self.limit).await?)
        })
        .await
        .context("Failed to read query statistics")?;
        let queries = distinct_sanitized(&raw);
        progress.discovered = queries.len();
        tracing::debug!(fetched = raw.len(), distinct = queries.len(), "sanitized query log");

        let summaries = try_join_all(
            queries
                .iter()
                .map(|q| summarize(self.model.as_ref(), intent_prompt(q), self.timeout)),
        )
        .await
        .context("Failed to summarize queries")?;

        for (query, summary) in queries.into_iter().zip(summaries) {
            let record = QueryIntentRecord::new(query, summary);
            embed_and_upsert(
                self.embedder.as_ref(),
                self.index.as_ref(),
                record.id(),
                &record.summary,
                record.to_metadata(),
                self.timeout,
            )
            .await
            .with_context(|| format!("Failed to upsert query intent {}", record.id()))?;
            progress.upserted += 1;
        }
        Ok(())
    }
}

/// Sanitize and de-duplicate, keeping first-seen (most frequent) order.
fn distinct_sanitized(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|q| sanitize_query(q))
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(q.clone()))
        .collect()
}

fn intent_prompt(sanitized_query: &str) -> String {
    format!(
        "Here is a SQL query that users run often:\n{sanitized_query}\n\n\
         Describe in one sentence the business question it answers. \
         Respond with the sentence only."
    )
}
