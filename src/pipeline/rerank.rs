use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;

use super::retrieval::{IntentMatch, TableMatch};
use crate::error::with_timeout;
use crate::llm::LanguageModel;
use crate::models::{TableDescriptor, Tier};

pub fn build_rerank_prompt(
    question: &str,
    tables: &[TableMatch],
    intents: &[IntentMatch],
) -> String {
    let ranking = Tier::RANKED
        .iter()
        .map(Tier::label)
        .collect::<Vec<_>>()
        .join(" > ");

    let mut table_lines = String::new();
    for m in tables {
        let t = &m.table;
        table_lines.push_str(&format!(
            "- {} [tier: {}, domain: {}]\n  summary: {}\n  columns: {}\n",
            t.name, t.tier, t.domain, t.summary, t.schema
        ));
    }

    let mut prompt = format!(
        "You select database tables for a SQL query.\n\
         Question: {question}\n\n\
         Candidate tables:\n{table_lines}\n"
    );

    if !intents.is_empty() {
        prompt.push_str("Similar questions users have asked before:\n");
        for m in intents {
            prompt.push_str(&format!("- {}\n", m.intent.summary));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Choose the smallest set of tables that is sufficient to answer the question. \
         When tables overlap, prefer the higher tier ({ranking}).\n\
         Respond with ONLY the table names, comma-separated, no other text."
    ));
    prompt
}

/// Split the model's reply into names, dropping blanks and repeats.
pub fn parse_table_list(reply: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    reply
        .split(',')
        .map(|name| name.trim().trim_matches('"').trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

/// Ask the model which of the retrieved tables are needed.
pub async fn select_tables(
    model: &dyn LanguageModel,
    question: &str,
    tables: &[TableMatch],
    intents: &[IntentMatch],
    timeout: Duration,
) -> Result<Vec<String>> {
    let prompt = build_rerank_prompt(question, tables, intents);
    let reply = with_timeout("table selection", timeout, model.invoke(&prompt)).await?;
    let selected = parse_table_list(&reply);
    tracing::debug!(?selected, "model selected tables");
    Ok(selected)
}

/// Intersect the selection with what was retrieved, in selection order.
/// Names the model invented are logged and dropped.
pub fn narrow(tables: &[TableMatch], selected: &[String]) -> Vec<TableDescriptor> {
    let mut narrowed = Vec::with_capacity(selected.len());
    for name in selected {
        match tables.iter().find(|m| &m.table.name == name) {
            Some(m) => narrowed.push(m.table.clone()),
            None => tracing::warn!(table = %name, "selected table was not retrieved, dropping"),
        }
    }
    if narrowed.is_empty() {
        tracing::warn!(?selected, "no selected table matched the retrieved set");
    }
    narrowed
}
