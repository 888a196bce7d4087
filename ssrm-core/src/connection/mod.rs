//! Database connection capability
//!
//! Each backend implements [`Connection`]: run a statement and return rows,
//! run a count statement, and introspect the target table. Backends are
//! selected by [`connect`] from the tag in [`BackendConfig`].
//!
//! - `sqlite`: embedded file database
//! - `mysql`: client-server database

mod mysql;
mod sqlite;

pub use mysql::MySqlConnection;
pub use sqlite::SqliteConnection;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::config::{BackendConfig, BackendKind, ConnectionDescriptor};
use crate::query::sql::{Dialect, Statement, TableRef};
use crate::types::{ColumnInfo, Row, Value};
use crate::{Error, Result};

/// Capability interface every backend provides
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Backend kind, used in logs
    fn kind(&self) -> BackendKind;

    /// Identifier quoting rules of this backend
    fn dialect(&self) -> Dialect;

    /// Run a row-returning statement
    async fn execute_query(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Run a single-value count statement; NULL and empty results count as 0
    async fn execute_count_query(&self, statement: &Statement) -> Result<u64> {
        let rows = self.execute_query(statement).await?;
        Ok(count_from_rows(&rows))
    }

    /// Column names and declared types, in table order
    async fn get_table_columns(&self, table: &TableRef) -> Result<Vec<ColumnInfo>>;

    /// Total rows in `table`
    async fn get_table_count(&self, table: &TableRef) -> Result<u64> {
        let statement = Statement::raw(format!(
            "SELECT COUNT(*) FROM {}",
            self.dialect().quote_table(table)
        ));
        self.execute_count_query(&statement).await
    }

    /// Release pooled connections
    async fn close(&self);
}

/// Open the backend described by `config`
pub async fn connect(config: &BackendConfig) -> Result<Arc<dyn Connection>> {
    config.validate()?;

    match &config.connection {
        ConnectionDescriptor::Sqlite { path } => {
            Ok(Arc::new(SqliteConnection::open(path, config).await?))
        }
        ConnectionDescriptor::Mysql { .. } => Ok(Arc::new(MySqlConnection::open(config).await?)),
    }
}

/// First value of the first row as a non-negative count
pub(crate) fn count_from_rows(rows: &[Row]) -> u64 {
    let Some(value) = rows.first().and_then(|row| row.values().next()) else {
        return 0;
    };

    match value {
        Value::Integer(i) => (*i).max(0) as u64,
        Value::Float(f) if f.is_finite() && *f > 0.0 => *f as u64,
        Value::Text(s) => s.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!(value = %s, "Non-numeric count result, using 0");
            0
        }),
        _ => 0,
    }
}

/// Introspection rows (name, declared type) to column metadata
pub(crate) fn columns_from_rows(rows: &[Row]) -> Vec<ColumnInfo> {
    rows.iter()
        .filter_map(|row| {
            let mut values = row.values();
            let name = values.next()?.as_str()?.to_string();
            let column_type = values
                .next()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(ColumnInfo {
                column_name: name,
                column_type,
            })
        })
        .collect()
}

/// Await a driver future under the statement timeout
///
/// Driver failures are logged together with the inline SQL and returned as
/// [`Error::QueryExecution`]; an elapsed timeout as [`Error::Timeout`].
pub(crate) async fn run_statement<T, F>(
    statement: &Statement,
    limit: Duration,
    future: F,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    debug!(sql = %statement, params = statement.params().count(), "Executing statement");

    match tokio::time::timeout(limit, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            let sql = statement.to_inline_sql();
            error!(sql = %sql, error = %e, "Statement failed");
            Err(Error::query_execution(sql, e.to_string()))
        }
        Err(_) => {
            let sql = statement.to_inline_sql();
            error!(sql = %sql, timeout_ms = limit.as_millis() as u64, "Statement timed out");
            Err(Error::timeout(sql, limit))
        }
    }
}
