//! Read-only gatekeeping for generated SQL.
//!
//! Gates run in order and the first rejection wins:
//!
//! ```text
//! empty check → keyword denylist → statement kind (sqlparser) → EXPLAIN dry-run
//! ```
//!
//! The denylist looks at every bare word the SQL tokenizer produces, so
//! keywords glued to punctuation (`(DELETE`, `;DROP`) are caught. The
//! statement gate catches what it misses whenever sqlparser understands the
//! query; queries it cannot parse are left for the database to judge.
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::sync::Arc;
use std::time::Duration;

use crate::db::Database;

/// Write or privilege keywords that disqualify a query outright.
pub const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "insert", "update", "delete", "drop", "create", "alter", "truncate", "grant", "revoke",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(msg.into()),
        }
    }
}

/// First forbidden keyword appearing as an unquoted word. String literals
/// and quoted identifiers never match.
pub fn find_forbidden_keyword(sql: &str) -> Option<&'static str> {
    match Tokenizer::new(&PostgreSqlDialect {}, sql).tokenize() {
        Ok(tokens) => tokens.iter().find_map(|token| match token {
            Token::Word(word) if word.quote_style.is_none() => forbidden(&word.value),
            _ => None,
        }),
        // Untokenizable input: fall back to any run of word characters.
        Err(_) => sql
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .find_map(forbidden),
    }
}

fn forbidden(word: &str) -> Option<&'static str> {
    FORBIDDEN_KEYWORDS
        .iter()
        .copied()
        .find(|kw| kw.eq_ignore_ascii_case(word))
}

/// Reject anything sqlparser recognizes as other than a single query.
/// `Ok(())` also covers SQL the parser does not understand.
pub fn check_statement_kind(sql: &str) -> Result<(), String> {
    let statements = match SqlParser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => {
            tracing::debug!(
                error = %e,
                "statement gate could not parse query, deferring to dry-run"
            );
            return Ok(());
        }
    };
    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        [] => Err("Query contains no statement".to_string()),
        [other] => Err(format!(
            "Only read queries are allowed, got: {}",
            statement_head(other)
        )),
        many => Err(format!(
            "Expected a single statement, found {}",
            many.len()
        )),
    }
}

fn statement_head(stmt: &Statement) -> String {
    stmt.to_string()
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct SqlValidator {
    db: Arc<dyn Database>,
    /// Upper bound on the dry-run.
    timeout: Duration,
}

impl SqlValidator {
    pub fn new(db: Arc<dyn Database>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    pub async fn validate(&self, sql: &str) -> ValidationOutcome {
        let sql = sql.trim();
        if sql.is_empty() {
            return ValidationOutcome::invalid("Generated query is empty");
        }

        if let Some(kw) = find_forbidden_keyword(sql) {
            tracing::debug!(keyword = kw, "keyword gate rejected query");
            return ValidationOutcome::invalid(format!(
                "Query contains forbidden keyword: {}",
                kw.to_uppercase()
            ));
        }

        if let Err(msg) = check_statement_kind(sql) {
            tracing::debug!(reason = %msg, "statement gate rejected query");
            return ValidationOutcome::invalid(msg);
        }

        match tokio::time::timeout(self.timeout, self.db.explain(sql)).await {
            Ok(Ok(())) => ValidationOutcome::valid(),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "dry-run rejected query");
                ValidationOutcome::invalid(e.to_string())
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "dry-run timed out");
                ValidationOutcome::invalid(format!("Dry-run timed out after {:?}", self.timeout))
            }
        }
    }
}
