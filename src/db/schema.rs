use crate::models::format_columns;

/// One column of a public base table, as reported by `information_schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRecord {
    pub table: String,
    pub column: String,
    pub data_type: String,
}

impl ColumnRecord {
    pub fn new(table: &str, column: &str, data_type: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            data_type: data_type.to_string(),
        }
    }
}

/// A table with its columns collapsed into a single schema string.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrospectedTable {
    pub name: String,
    pub schema: String,
}

pub(crate) const TABLE_COLUMNS_SQL: &str = r#"
    SELECT
        c.table_name::text AS table_name,
        c.column_name::text AS column_name,
        c.data_type::text AS data_type
    FROM information_schema.columns c
    JOIN information_schema.tables t
        ON t.table_schema = c.table_schema
        AND t.table_name = c.table_name
    WHERE c.table_schema = 'public'
      AND t.table_type = 'BASE TABLE'
    ORDER BY c.table_name, c.ordinal_position
"#;

/// Most-called read statements. Requires the `pg_stat_statements` extension.
pub(crate) const FREQUENT_QUERIES_SQL: &str = r#"
    SELECT query
    FROM pg_stat_statements
    WHERE query ~* '^\s*(select|with)\s'
    ORDER BY calls DESC
    LIMIT $1
"#;

/// Group column rows into one entry per table. Rows for a table need not be
/// contiguous; table order follows first appearance and column order is kept.
pub fn group_columns(columns: &[ColumnRecord]) -> Vec<IntrospectedTable> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: std::collections::HashMap<&str, Vec<(&str, &str)>> =
        std::collections::HashMap::new();

    for col in columns {
        let entry = grouped.entry(col.table.as_str()).or_insert_with(|| {
            order.push(col.table.as_str());
            Vec::new()
        });
        entry.push((col.column.as_str(), col.data_type.as_str()));
    }

    order
        .into_iter()
        .map(|table| IntrospectedTable {
            name: table.to_string(),
            schema: format_columns(grouped.remove(table).unwrap_or_default()),
        })
        .collect()
}
