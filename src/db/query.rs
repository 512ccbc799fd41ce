use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;
use tokio_postgres::{types::Type, Row};

/// Categorized error types for SQL query failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCategory {
    /// Syntax errors (SQLSTATE class 42 - syntax_error, etc.)
    Syntax,
    /// Semantic errors (missing table/column, ambiguous reference)
    Semantic,
    /// Execution/runtime errors (division by zero, constraint violation)
    Execution,
    /// Transaction state errors (e.g., read-only transaction)
    Transaction,
    /// Connection/communication errors, including pool checkout
    Connection,
    /// Unknown or unclassified errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Syntax => write!(f, "Syntax Error"),
            ErrorCategory::Semantic => write!(f, "Semantic Error"),
            ErrorCategory::Execution => write!(f, "Execution Error"),
            ErrorCategory::Transaction => write!(f, "Transaction Error"),
            ErrorCategory::Connection => write!(f, "Connection Error"),
            ErrorCategory::Unknown => write!(f, "Error"),
        }
    }
}

/// A database failure with the context PostgreSQL reported for it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", self.display_full())]
pub struct DbError {
    pub category: ErrorCategory,
    /// SQLSTATE error code (e.g., "42601" for syntax_error)
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// 1-based line/column computed from the reported byte position
    pub line: Option<usize>,
    pub col: Option<usize>,
}

impl DbError {
    /// Build from a tokio_postgres error. `query` is the statement text the
    /// server saw, used to turn the error position into line/column.
    pub fn from_pg_error(err: &tokio_postgres::Error, query: &str) -> Self {
        let Some(db_err) = err.as_db_error() else {
            let category = if err.source().is_some() {
                ErrorCategory::Connection
            } else {
                ErrorCategory::Unknown
            };
            return DbError {
                category,
                code: String::new(),
                message: err.to_string(),
                detail: err.source().map(|e| e.to_string()),
                hint: None,
                line: None,
                col: None,
            };
        };

        let code = db_err.code().code().to_string();
        let (line, col) = match db_err.position() {
            Some(tokio_postgres::error::ErrorPosition::Original(pos)) => {
                byte_offset_to_line_col(query, *pos as usize)
            }
            _ => (None, None),
        };

        DbError {
            category: categorize_sqlstate(&code),
            code,
            message: db_err.message().to_string(),
            detail: db_err.detail().map(|s| s.to_string()),
            hint: db_err.hint().map(|s| s.to_string()),
            line,
            col,
        }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        DbError {
            category: ErrorCategory::Connection,
            code: String::new(),
            message: msg.into(),
            detail: None,
            hint: None,
            line: None,
            col: None,
        }
    }

    /// Single-line rendering: category, message, position, SQLSTATE, hint.
    pub fn display_full(&self) -> String {
        let mut out = format!("{}: {}", self.category, self.message);
        if let (Some(line), Some(col)) = (self.line, self.col) {
            out.push_str(&format!(" (line {}, column {})", line, col));
        }
        if !self.code.is_empty() {
            out.push_str(&format!(" [SQLSTATE {}]", self.code));
        }
        if let Some(detail) = &self.detail {
            out.push_str(&format!("; detail: {}", detail));
        }
        if let Some(hint) = &self.hint {
            out.push_str(&format!("; hint: {}", hint));
        }
        out
    }
}

/// Convert a 1-based byte offset in a query string to (line, column) both 1-based.
fn byte_offset_to_line_col(query: &str, byte_pos: usize) -> (Option<usize>, Option<usize>) {
    if byte_pos == 0 || query.is_empty() {
        return (Some(1), Some(1));
    }
    let target = (byte_pos - 1).min(query.len());
    let mut line = 1usize;
    let mut col = 1usize;
    for (i, ch) in query.char_indices() {
        if i >= target {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (Some(line), Some(col))
}

/// Categorize a SQLSTATE code into an ErrorCategory.
fn categorize_sqlstate(code: &str) -> ErrorCategory {
    if code.len() < 2 {
        return ErrorCategory::Unknown;
    }
    match &code[..2] {
        "42" if code == "42601" || code == "42000" => ErrorCategory::Syntax,
        // 42P01 = undefined_table, 42703 = undefined_column, etc.
        "42" => ErrorCategory::Semantic,
        "22" | "23" | "53" | "54" | "55" | "57" => ErrorCategory::Execution,
        "25" | "40" => ErrorCategory::Transaction,
        "08" => ErrorCategory::Connection,
        _ => ErrorCategory::Unknown,
    }
}

/// Convert a result row into a JSON object keyed by column name.
pub fn row_to_json(row: &Row) -> Map<String, Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), cell_to_json(row, idx, col.type_())))
        .collect()
}

fn cell_to_json(row: &Row, idx: usize, pg_type: &Type) -> Value {
    fn get<'a, T>(row: &'a Row, idx: usize) -> Option<T>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(idx).ok().flatten()
    }

    let value = match *pg_type {
        Type::BOOL => get::<bool>(row, idx).map(Value::from),
        Type::INT2 => get::<i16>(row, idx).map(Value::from),
        Type::INT4 => get::<i32>(row, idx).map(Value::from),
        Type::INT8 => get::<i64>(row, idx).map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx).map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx).map(Value::from),
        Type::DATE => get::<NaiveDate>(row, idx).map(|d| Value::from(d.to_string())),
        Type::TIME => get::<NaiveTime>(row, idx).map(|t| Value::from(t.to_string())),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx).map(|t| Value::from(t.to_string())),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx).map(|t| Value::from(t.to_rfc3339())),
        Type::JSON | Type::JSONB => get::<Value>(row, idx),
        Type::BYTEA => {
            get::<Vec<u8>>(row, idx).map(|b| Value::from(format!("[{} bytes]", b.len())))
        }
        // Text-like types, and a best-effort text read for everything else
        _ => get::<String>(row, idx).map(Value::from),
    };
    value.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Syntax.to_string(), "Syntax Error");
        assert_eq!(ErrorCategory::Semantic.to_string(), "Semantic Error");
        assert_eq!(ErrorCategory::Connection.to_string(), "Connection Error");
        assert_eq!(ErrorCategory::Unknown.to_string(), "Error");
    }

    #[test]
    fn test_categorize_sqlstate() {
        assert_eq!(categorize_sqlstate("42601"), ErrorCategory::Syntax);
        assert_eq!(categorize_sqlstate("42P01"), ErrorCategory::Semantic);
        assert_eq!(categorize_sqlstate("42703"), ErrorCategory::Semantic);
        assert_eq!(categorize_sqlstate("22012"), ErrorCategory::Execution);
        assert_eq!(categorize_sqlstate("25006"), ErrorCategory::Transaction);
        assert_eq!(categorize_sqlstate("08006"), ErrorCategory::Connection);
        assert_eq!(categorize_sqlstate("XX000"), ErrorCategory::Unknown);
        assert_eq!(categorize_sqlstate(""), ErrorCategory::Unknown);
    }

    #[test]
    fn test_byte_offset_to_line_col() {
        let query = "SELECT *\nFROM users\nWHERE id = 1";
        assert_eq!(byte_offset_to_line_col(query, 1), (Some(1), Some(1)));
        assert_eq!(byte_offset_to_line_col(query, 10), (Some(2), Some(1)));
        assert_eq!(byte_offset_to_line_col(query, 21), (Some(3), Some(1)));
    }

    #[test]
    fn test_display_full() {
        let err = DbError {
            category: ErrorCategory::Semantic,
            code: "42P01".to_string(),
            message: "relation \"leads\" does not exist".to_string(),
            detail: None,
            hint: Some("Check the table name.".to_string()),
            line: Some(1),
            col: Some(15),
        };
        assert_eq!(
            err.to_string(),
            "Semantic Error: relation \"leads\" does not exist (line 1, column 15) \
             [SQLSTATE 42P01]; hint: Check the table name."
        );
    }

    #[test]
    fn test_connection_error() {
        let err = DbError::connection("pool timed out");
        assert_eq!(err.category, ErrorCategory::Connection);
        assert_eq!(err.to_string(), "Connection Error: pool timed out");
    }
}
