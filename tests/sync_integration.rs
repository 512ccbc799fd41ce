//! Schema and query-log sync jobs against an in-memory vector index.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FlakyIndex, KeywordEmbedder, ScriptedModel, StubDatabase};
use pgrag::db::ColumnRecord;
use pgrag::models::{intent_id, TableDescriptor, Tier};
use pgrag::sync::{
    CuratedMetadata, CuratedSource, CuratedTable, JobOutcome, QueryLogSync, SchemaSync,
};
use pgrag::vector::MemoryIndex;

const TIMEOUT: Duration = Duration::from_secs(5);

fn crm_database() -> StubDatabase {
    StubDatabase {
        columns: vec![
            ColumnRecord::new("lead", "id", "integer"),
            ColumnRecord::new("lead", "createdAt", "timestamp without time zone"),
            ColumnRecord::new("ticket", "id", "integer"),
            ColumnRecord::new("ticket", "leadId", "integer"),
            ColumnRecord::new("ticket", "subject", "text"),
        ],
        ..StubDatabase::default()
    }
}

/// Summaries name the table so each is distinguishable.
fn summarizer() -> ScriptedModel {
    ScriptedModel::new(|prompt| {
        let table = prompt.split('"').nth(1).unwrap_or("unknown");
        Ok(format!("\"Records of every {table}.\""))
    })
}

fn gold_lead() -> CuratedSource {
    let mut curated = CuratedMetadata::default();
    curated.tables.insert(
        "lead".to_string(),
        CuratedTable {
            tier: Some(Tier::Gold),
            domain: Some("Sales".to_string()),
            ..CuratedTable::default()
        },
    );
    CuratedSource::Inline(curated)
}

fn schema_sync(db: StubDatabase, index: Arc<MemoryIndex>, curated: CuratedSource) -> SchemaSync {
    SchemaSync::new(
        Arc::new(db),
        Arc::new(summarizer()),
        Arc::new(KeywordEmbedder),
        index,
        curated,
        TIMEOUT,
    )
}

#[tokio::test]
async fn test_schema_sync_upserts_one_entry_per_table() {
    let index = Arc::new(MemoryIndex::new());
    let report = schema_sync(crm_database(), index.clone(), gold_lead()).run().await;

    assert_eq!(report.outcome, JobOutcome::Succeeded);
    assert_eq!(report.discovered, 2);
    assert_eq!(report.upserted, 2);

    let lead = TableDescriptor::from_metadata(&index.get("lead").unwrap().metadata).unwrap();
    assert_eq!(lead.schema, "id integer, createdAt timestamp without time zone");
    assert_eq!(lead.summary, "Records of every lead.");
    assert_eq!(lead.tier, Tier::Gold);
    assert_eq!(lead.domain, "Sales");

    let ticket = TableDescriptor::from_metadata(&index.get("ticket").unwrap().metadata).unwrap();
    assert_eq!(ticket.tier, Tier::Iron);
    assert_eq!(ticket.domain, "IRON");
}

#[tokio::test]
async fn test_schema_sync_twice_is_idempotent() {
    let index = Arc::new(MemoryIndex::new());
    schema_sync(crm_database(), index.clone(), gold_lead()).run().await;
    let first = index.snapshot();

    let report = schema_sync(crm_database(), index.clone(), gold_lead()).run().await;
    assert!(report.succeeded());

    let second = index.snapshot();
    assert_eq!(first, second);
    let ids: Vec<&str> = second.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["lead", "ticket"]);
}

#[tokio::test]
async fn test_curated_file_overrides_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curated.toml");
    std::fs::write(
        &path,
        "[ticket]\ntier = \"SILVER\"\nsummary = \"Support requests raised against leads.\"\n",
    )
    .unwrap();

    let index = Arc::new(MemoryIndex::new());
    let report = schema_sync(crm_database(), index.clone(), CuratedSource::File(path))
        .run()
        .await;
    assert!(report.succeeded());

    let ticket = TableDescriptor::from_metadata(&index.get("ticket").unwrap().metadata).unwrap();
    assert_eq!(ticket.tier, Tier::Silver);
    assert_eq!(ticket.domain, "SILVER");
    assert_eq!(ticket.summary, "Support requests raised against leads.");
}

#[tokio::test]
async fn test_curated_extra_fields_reach_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curated.toml");
    std::fs::write(&path, "[lead]\ntier = \"GOLD\"\nowner = \"sales-ops\"\n").unwrap();

    let index = Arc::new(MemoryIndex::new());
    let report = schema_sync(crm_database(), index.clone(), CuratedSource::File(path))
        .run()
        .await;
    assert!(report.succeeded());

    let metadata = index.get("lead").unwrap().metadata;
    assert_eq!(metadata["owner"], "sales-ops");
    let lead = TableDescriptor::from_metadata(&metadata).unwrap();
    assert_eq!(lead.tier, Tier::Gold);
    assert_eq!(lead.extra["owner"], "sales-ops");
}

#[tokio::test]
async fn test_slow_introspection_fails_run() {
    let db = StubDatabase {
        delay: Some(Duration::from_secs(5)),
        ..crm_database()
    };
    let index = Arc::new(MemoryIndex::new());
    let sync = SchemaSync::new(
        Arc::new(db),
        Arc::new(summarizer()),
        Arc::new(KeywordEmbedder),
        index.clone(),
        CuratedSource::None,
        Duration::from_millis(20),
    );

    let report = sync.run().await;
    match &report.outcome {
        JobOutcome::Failed { error } => assert!(error.contains("timed out"), "{error}"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(index.is_empty());
}

#[tokio::test]
async fn test_malformed_curated_file_fails_run_without_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curated.json");
    std::fs::write(&path, "{ not json").unwrap();

    let index = Arc::new(MemoryIndex::new());
    let report = schema_sync(crm_database(), index.clone(), CuratedSource::File(path))
        .run()
        .await;

    match &report.outcome {
        JobOutcome::Failed { error } => assert!(error.contains("Invalid curated metadata")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(report.upserted, 0);
    assert!(index.is_empty());
}

#[tokio::test]
async fn test_late_failure_keeps_earlier_upserts() {
    let index = Arc::new(FlakyIndex {
        inner: MemoryIndex::new(),
        fail_after: 1,
    });
    let sync = SchemaSync::new(
        Arc::new(crm_database()),
        Arc::new(summarizer()),
        Arc::new(KeywordEmbedder),
        index.clone(),
        CuratedSource::None,
        TIMEOUT,
    );

    let report = sync.run().await;
    assert!(!report.succeeded());
    assert_eq!(report.discovered, 2);
    assert_eq!(report.upserted, 1);
    assert_eq!(index.inner.len(), 1);
    match &report.outcome {
        JobOutcome::Failed { error } => {
            assert!(error.contains("Failed to upsert table ticket"));
            assert!(error.contains("vector store rejected write"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_summary_failure_is_contained() {
    let sync = SchemaSync::new(
        Arc::new(crm_database()),
        Arc::new(ScriptedModel::new(|_| anyhow::bail!("model offline"))),
        Arc::new(KeywordEmbedder),
        Arc::new(MemoryIndex::new()),
        CuratedSource::None,
        TIMEOUT,
    );

    let report = sync.run().await;
    assert!(!report.succeeded());
    assert_eq!(report.upserted, 0);
}

fn query_log_sync(db: StubDatabase, index: Arc<MemoryIndex>, limit: usize) -> QueryLogSync {
    let model = ScriptedModel::new(|prompt| {
        Ok(if prompt.contains("\"ticket\"") {
            "Tickets opened for a lead.".to_string()
        } else {
            "Look up one lead.".to_string()
        })
    });
    QueryLogSync::new(
        Arc::new(db),
        Arc::new(model),
        Arc::new(KeywordEmbedder),
        index,
        limit,
        TIMEOUT,
    )
}

fn logged_queries() -> StubDatabase {
    StubDatabase {
        queries: vec![
            "SELECT * FROM \"lead\" WHERE \"id\" = 41".to_string(),
            "SELECT * FROM \"lead\" WHERE \"id\" = 7".to_string(),
            "SELECT * FROM \"ticket\" WHERE \"leadId\" = 3 AND \"status\" = 'open'".to_string(),
        ],
        ..StubDatabase::default()
    }
}

#[tokio::test]
async fn test_query_log_sync_collapses_literals() {
    let index = Arc::new(MemoryIndex::new());
    let report = query_log_sync(logged_queries(), index.clone(), 100).run().await;

    assert!(report.succeeded());
    assert_eq!(report.discovered, 2);
    assert_eq!(report.upserted, 2);

    let lead_query = "SELECT * FROM \"lead\" WHERE \"id\" = ?";
    let record = index.get(&intent_id(lead_query)).unwrap();
    assert_eq!(record.metadata["query"], lead_query);
    assert_eq!(record.metadata["summary"], "Look up one lead.");

    let ticket_query = "SELECT * FROM \"ticket\" WHERE \"leadId\" = ? AND \"status\" = '?'";
    let record = index.get(&intent_id(ticket_query)).unwrap();
    assert_eq!(record.metadata["summary"], "Tickets opened for a lead.");
}

#[tokio::test]
async fn test_query_log_sync_rerun_overwrites_same_ids() {
    let index = Arc::new(MemoryIndex::new());
    query_log_sync(logged_queries(), index.clone(), 100).run().await;
    let first = index.snapshot();
    query_log_sync(logged_queries(), index.clone(), 100).run().await;
    assert_eq!(index.snapshot(), first);
    assert_eq!(index.len(), 2);
}

#[tokio::test]
async fn test_query_log_sync_respects_limit() {
    let index = Arc::new(MemoryIndex::new());
    let report = query_log_sync(logged_queries(), index.clone(), 1).run().await;
    assert_eq!(report.discovered, 1);
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn test_slow_query_statistics_fail_run() {
    let db = StubDatabase {
        delay: Some(Duration::from_secs(5)),
        ..logged_queries()
    };
    let sync = QueryLogSync::new(
        Arc::new(db),
        Arc::new(summarizer()),
        Arc::new(KeywordEmbedder),
        Arc::new(MemoryIndex::new()),
        100,
        Duration::from_millis(20),
    );

    let report = sync.run().await;
    match &report.outcome {
        JobOutcome::Failed { error } => {
            assert!(error.contains("Failed to read query statistics"));
            assert!(error.contains("timed out"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
