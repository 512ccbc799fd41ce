//! Background jobs that keep the two vector indexes current.
//!
//! Both jobs follow the same shape: pull from the database, summarize each
//! item with the language model (concurrently), then embed and upsert the
//! items one at a time. A run never returns an error; failures are logged
//! and recorded in the [`JobReport`] so a scheduler can alert on them.

mod curated;
mod query_log;
mod sanitize;
mod schema;

pub use curated::{merge, CuratedMetadata, CuratedSource, CuratedTable};
pub use query_log::QueryLogSync;
pub use sanitize::{sanitize_query, NUMERIC_PLACEHOLDER, STRING_PLACEHOLDER};
pub use schema::SchemaSync;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::error::with_timeout;
use crate::llm::{Embedder, LanguageModel};
use crate::vector::{Metadata, VectorIndex, VectorRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed { error: String },
}

/// What one run of a sync job did.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: &'static str,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    /// Tables or distinct queries found at the source.
    pub discovered: usize,
    /// Records written before the run ended. Partial on failure.
    pub upserted: usize,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == JobOutcome::Succeeded
    }
}

/// Counters a job updates as it goes, so a failed run still reports them.
#[derive(Debug, Default)]
pub(crate) struct JobProgress {
    pub discovered: usize,
    pub upserted: usize,
}

pub(crate) struct JobRun {
    job: &'static str,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl JobRun {
    pub fn start(job: &'static str) -> Self {
        tracing::info!(job, "sync job started");
        Self {
            job,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    /// Contain the run's result in a report and log it.
    pub fn finish(self, progress: JobProgress, result: Result<()>) -> JobReport {
        let elapsed_ms = self.clock.elapsed().as_millis() as u64;
        let outcome = match result {
            Ok(()) => {
                tracing::info!(
                    job = self.job,
                    discovered = progress.discovered,
                    upserted = progress.upserted,
                    elapsed_ms,
                    "sync job succeeded"
                );
                JobOutcome::Succeeded
            }
            Err(e) => {
                let error = format!("{e:#}");
                tracing::error!(
                    job = self.job,
                    discovered = progress.discovered,
                    upserted = progress.upserted,
                    elapsed_ms,
                    %error,
                    "sync job failed"
                );
                JobOutcome::Failed { error }
            }
        };
        JobReport {
            job: self.job,
            started_at: self.started_at,
            elapsed_ms,
            outcome,
            discovered: progress.discovered,
            upserted: progress.upserted,
        }
    }
}

/// Ask the model for a one-sentence summary and tidy the reply.
pub(crate) async fn summarize(
    model: &dyn LanguageModel,
    prompt: String,
    timeout: Duration,
) -> Result<String> {
    let reply = with_timeout("summary", timeout, model.invoke(&prompt)).await?;
    Ok(reply.trim().trim_matches('"').trim().to_string())
}

/// Embed `text` and write a single record.
pub(crate) async fn embed_and_upsert(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    id: String,
    text: &str,
    metadata: Metadata,
    timeout: Duration,
) -> Result<()> {
    let values = with_timeout("summary embedding", timeout, embedder.embed(text)).await?;
    let record = VectorRecord {
        id,
        values,
        metadata,
    };
    with_timeout("vector upsert", timeout, index.upsert(vec![record])).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_success() {
        let progress = JobProgress {
            discovered: 3,
            upserted: 3,
        };
        let report = JobRun::start("schema").finish(progress, Ok(()));
        assert!(report.succeeded());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["job"], "schema");
        assert_eq!(json["outcome"], "succeeded");
        assert_eq!(json["discovered"], 3);
        assert_eq!(json["upserted"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_report_json_failure_keeps_partial_counts() {
        let progress = JobProgress {
            discovered: 4,
            upserted: 2,
        };
        let err = anyhow::anyhow!("connection reset").context("Failed to upsert table lead");
        let report = JobRun::start("schema").finish(progress, Err(err));
        assert!(!report.succeeded());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"], "Failed to upsert table lead: connection reset");
        assert_eq!(json["upserted"], 2);
    }
}
