mod connection;
mod query;
mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use serde_json::{Map, Value};

/// Relational database collaborator of the pipeline and the sync jobs.
#[async_trait]
pub trait Database: Send + Sync {
    /// Columns of every public base table, ordered by table then position.
    async fn table_columns(&self) -> Result<Vec<ColumnRecord>, DbError>;

    /// Up to `limit` read statements, most frequently executed first.
    async fn frequent_queries(&self, limit: usize) -> Result<Vec<String>, DbError>;

    /// Plan the statement without running it.
    async fn explain(&self, sql: &str) -> Result<(), DbError>;

    /// Run a read query in a read-only transaction.
    async fn read_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>, DbError>;
}

/// PostgreSQL over a connection pool. Each call checks out one connection,
/// which goes back to the pool when the call's guard drops.
#[derive(Clone)]
pub struct PgDatabase {
    pool: Pool,
}

impl PgDatabase {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn connect(config: &ConnectionConfig) -> anyhow::Result<Self> {
        Ok(Self::new(create_pool(config)?))
    }

    async fn checkout(&self) -> Result<Object, DbError> {
        self.pool
            .get()
            .await
            .map_err(|e| DbError::connection(format!("Failed to acquire connection: {e}")))
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn table_columns(&self) -> Result<Vec<ColumnRecord>, DbError> {
        let client = self.checkout().await?;
        let rows = client
            .query(TABLE_COLUMNS_SQL, &[])
            .await
            .map_err(|e| DbError::from_pg_error(&e, TABLE_COLUMNS_SQL))?;

        Ok(rows
            .iter()
            .map(|row| ColumnRecord {
                table: row.get("table_name"),
                column: row.get("column_name"),
                data_type: row.get("data_type"),
            })
            .collect())
    }

    async fn frequent_queries(&self, limit: usize) -> Result<Vec<String>, DbError> {
        let client = self.checkout().await?;
        let limit = limit as i64;
        let rows = client
            .query(FREQUENT_QUERIES_SQL, &[&limit])
            .await
            .map_err(|e| DbError::from_pg_error(&e, FREQUENT_QUERIES_SQL))?;

        Ok(rows.iter().map(|row| row.get("query")).collect())
    }

    async fn explain(&self, sql: &str) -> Result<(), DbError> {
        let mut client = self.checkout().await?;
        let statement = format!("EXPLAIN {}", sql);
        // Positions in server errors count from the start of `statement`.
        let tx = client
            .build_transaction()
            .read_only(true)
            .start()
            .await
            .map_err(|e| DbError::from_pg_error(&e, &statement))?;
        let result = tx
            .query(statement.as_str(), &[])
            .await
            .map(|_| ())
            .map_err(|e| DbError::from_pg_error(&e, &statement));
        // Dropping the transaction rolls it back.
        drop(tx);
        result
    }

    async fn read_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>, DbError> {
        let mut client = self.checkout().await?;
        let tx = client
            .build_transaction()
            .read_only(true)
            .start()
            .await
            .map_err(|e| DbError::from_pg_error(&e, sql))?;
        let rows = tx
            .query(sql, &[])
            .await
            .map_err(|e| DbError::from_pg_error(&e, sql))?;
        drop(tx);
        Ok(rows.iter().map(row_to_json).collect())
    }
}
