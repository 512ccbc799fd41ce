use anyhow::Result;
use std::time::Duration;

use super::response::{EXPLANATION_MARKER, QUERY_MARKER};
use super::retrieval::IntentMatch;
use crate::error::with_timeout;
use crate::llm::LanguageModel;
use crate::models::TableDescriptor;

pub fn build_generation_prompt(
    dialect: &str,
    question: &str,
    tables: &[TableDescriptor],
    examples: &[IntentMatch],
) -> String {
    let mut schema = String::new();
    for t in tables {
        schema.push_str(&format!("Table \"{}\": {}\n  Columns: {}\n", t.name, t.summary, t.schema));
    }
    if schema.is_empty() {
        schema.push_str("(no tables available)\n");
    }

    let mut prompt = format!(
        "You write {dialect} queries.\n\
         Use ONLY the tables and columns listed below. Never modify data: \
         the query must be a single read-only SELECT statement.\n\
         Wrap every table and column identifier in double quotes to preserve its case, \
         e.g. SELECT \"createdAt\" FROM \"lead\".\n\n\
         Schema:\n{schema}\n"
    );

    if !examples.is_empty() {
        prompt.push_str("Queries that answered similar questions:\n");
        for m in examples {
            prompt.push_str(&format!(
                "- {}\n  {}\n",
                m.intent.summary, m.intent.sanitized_query
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Question: {question}\n\n\
         Your response MUST begin with exactly one of these markers:\n\
         {QUERY_MARKER} followed by the SQL query and nothing else, or\n\
         {EXPLANATION_MARKER} followed by a short explanation if the schema \
         is not sufficient to answer the question."
    ));
    prompt
}

/// Produce the raw tagged model output. Parsing and validation happen later.
pub async fn generate(
    model: &dyn LanguageModel,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    with_timeout("query generation", timeout, model.invoke(prompt)).await
}
