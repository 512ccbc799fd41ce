use std::future::Future;
use std::time::Duration;

/// Why a question could not be turned into a validated query. Any stage
/// failure aborts the whole invocation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("retrieval failed: {0:#}")]
    Retrieval(#[source] anyhow::Error),

    #[error("table selection failed: {0:#}")]
    Rerank(#[source] anyhow::Error),

    #[error("query generation failed: {0:#}")]
    Generation(#[source] anyhow::Error),

    #[error("model response contained neither <@query@> nor <@explanation@>")]
    GenerationFormat { raw: String },

    #[error("not enough context to answer: {0}")]
    InsufficientContext(String),

    #[error("generated query rejected: {0}")]
    Validation(String),
}

/// Run one external call under a time budget. Expiry becomes an error of
/// the calling stage.
pub(crate) async fn with_timeout<T, F>(what: &str, limit: Duration, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!("{what} timed out after {limit:?}"),
    }
}
