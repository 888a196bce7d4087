//! SQLite backend

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};
use tracing::{info, warn};

use super::{columns_from_rows, run_statement, Connection};
use crate::config::{BackendConfig, BackendKind};
use crate::query::sql::{Dialect, SqlParam, Statement, TableRef};
use crate::types::{ColumnInfo, Row, Value};
use crate::{Error, Result};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Pooled connection to a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    pool: SqlitePool,
    dialect: Dialect,
    timeout: Duration,
}

impl SqliteConnection {
    /// Open an existing database file read-only; a missing file is a
    /// connection error
    pub async fn open(path: &Path, config: &BackendConfig) -> Result<Self> {
        info!(path = %path.display(), "Opening SQLite database");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::connection(format!(
                    "failed to open SQLite database {}: {}",
                    path.display(),
                    e
                ))
            })?;

        info!(
            path = %path.display(),
            max_connections = config.max_connections,
            "SQLite connection pool ready"
        );

        Ok(Self::from_pool(pool, config.dialect(), config.statement_timeout()))
    }

    /// Wrap an already configured pool
    pub fn from_pool(pool: SqlitePool, dialect: Dialect, timeout: Duration) -> Self {
        Self {
            pool,
            dialect,
            timeout,
        }
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute_query(&self, statement: &Statement) -> Result<Vec<Row>> {
        let sql = statement.sql();
        let mut query = sqlx::query(&sql);
        for param in statement.params() {
            query = bind_param(query, param);
        }

        let rows = run_statement(statement, self.timeout, query.fetch_all(&self.pool)).await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn get_table_columns(&self, table: &TableRef) -> Result<Vec<ColumnInfo>> {
        let mut statement = Statement::raw("SELECT name, type FROM pragma_table_info(");
        statement.push_param(SqlParam::Text(table.name.clone()));
        if let Some(schema) = &table.schema {
            statement.push_sql(", ");
            statement.push_param(SqlParam::Text(schema.clone()));
        }
        statement.push_sql(") ORDER BY cid");

        let rows = self.execute_query(&statement).await?;
        Ok(columns_from_rows(&rows))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_param<'q>(query: SqliteQuery<'q>, param: &'q SqlParam) -> SqliteQuery<'q> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Integer(v) => query.bind(*v),
        SqlParam::Real(v) => query.bind(*v),
        SqlParam::Text(v) => query.bind(v.as_str()),
    }
}

fn decode_row(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| (column.name().to_string(), decode_value(row, index)))
        .collect()
}

/// Decode by the value's runtime storage class
fn decode_value(row: &SqliteRow, index: usize) -> Value {
    let storage_class = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(e) => {
            warn!(index, error = %e, "Failed to read SQLite value");
            return Value::Null;
        }
    };

    let decoded = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index).map(Value::Integer),
        "REAL" | "NUMERIC" => row.try_get::<f64, _>(index).map(Value::Float),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(Value::Blob),
        _ => row.try_get::<String, _>(index).map(Value::Text),
    };

    decoded.unwrap_or_else(|e| {
        warn!(index, storage_class = %storage_class, error = %e, "Unsupported SQLite value");
        Value::Null
    })
}
