use anyhow::Result;
use std::time::Duration;

use crate::error::with_timeout;
use crate::llm::Embedder;
use crate::models::{QueryIntentRecord, TableDescriptor};
use crate::vector::VectorIndex;

#[derive(Debug, Clone, PartialEq)]
pub struct TableMatch {
    pub table: TableDescriptor,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntentMatch {
    pub intent: QueryIntentRecord,
    pub score: f32,
}

/// Output of the retrieval stage, in the store's similarity order.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub tables: Vec<TableMatch>,
    pub intents: Vec<IntentMatch>,
}

pub struct RetrievalRequest<'a> {
    pub question: &'a str,
    pub table_top_k: usize,
    pub intent_top_k: usize,
    pub timeout: Duration,
}

/// Embed the question, then query both indexes concurrently. Errors from
/// either adapter propagate unchanged; there is no retry.
pub async fn retrieve(
    embedder: &dyn Embedder,
    tables: &dyn VectorIndex,
    intents: &dyn VectorIndex,
    req: RetrievalRequest<'_>,
) -> Result<Retrieved> {
    let embedding =
        with_timeout("question embedding", req.timeout, embedder.embed(req.question)).await?;

    let (table_hits, intent_hits) = tokio::try_join!(
        with_timeout(
            "table index query",
            req.timeout,
            tables.query(&embedding, req.table_top_k)
        ),
        with_timeout(
            "query-intent index query",
            req.timeout,
            intents.query(&embedding, req.intent_top_k)
        ),
    )?;

    let tables: Vec<TableMatch> = table_hits
        .into_iter()
        .filter_map(|m| {
            TableDescriptor::from_metadata(&m.metadata).map(|table| TableMatch {
                table,
                score: m.score,
            })
        })
        .collect();
    let intents: Vec<IntentMatch> = intent_hits
        .into_iter()
        .filter_map(|m| {
            QueryIntentRecord::from_metadata(&m.metadata).map(|intent| IntentMatch {
                intent,
                score: m.score,
            })
        })
        .collect();

    tracing::debug!(
        tables = ?tables.iter().map(|t| t.table.name.as_str()).collect::<Vec<_>>(),
        intents = intents.len(),
        "retrieval complete"
    );

    Ok(Retrieved { tables, intents })
}
