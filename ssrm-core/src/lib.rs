//! SSRM Core Query Engine
//!
//! Translates server-side row model grid requests (row window, sort, filter,
//! group drill-down, aggregation) into SQL, runs them against SQLite or MySQL
//! and returns JSON-safe pages together with the total row count.

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod error;
pub mod formatter;
pub mod query;
pub mod schema;
pub mod types;

// Re-export main types for convenience
pub use crate::{
    config::{BackendConfig, BackendKind, ConnectionDescriptor},
    connection::Connection,
    error::{Error, ErrorCategory, Result},
    query::{GridRequest, QueryEngine, QueryOutcome, QueryPlan, QueryStats, SsrmResponse},
    schema::ColumnWhitelist,
    types::{ColumnInfo, Row, TableInfo, Value},
};

use tracing::info;

/// Service handle for one configured table
///
/// Owns the backend connection pool and the query engine. Opened once at
/// startup and shared by every request.
#[derive(Debug)]
pub struct SsrmService {
    engine: QueryEngine,
    config: BackendConfig,
}

impl SsrmService {
    /// Connect to the configured backend and prepare the query engine
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The backend cannot be reached
    /// - Column validation is enabled and the table has no columns
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use ssrm_core::{BackendConfig, GridRequest, SsrmService};
    ///
    /// # async fn run() -> ssrm_core::Result<()> {
    /// let service = SsrmService::open(BackendConfig::for_sqlite("demo_data.db", "demo_data")).await?;
    /// let request = GridRequest::from_json(r#"{"startRow": 0, "endRow": 100}"#)?;
    /// let response = service.query(&request).await?;
    /// println!("{} rows in total", response.row_count);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(config: BackendConfig) -> Result<Self> {
        config.validate()?;

        let connection = connection::connect(&config).await?;
        let table = config.table_ref();

        let mut engine = QueryEngine::new(connection.clone(), table.clone());
        if config.validate_columns {
            let columns = connection.get_table_columns(&table).await?;
            if columns.is_empty() {
                connection.close().await;
                return Err(Error::configuration(format!(
                    "table {} does not exist or has no columns",
                    table
                )));
            }
            info!(table = %table, columns = columns.len(), "Loaded table schema");
            engine = engine.with_whitelist(ColumnWhitelist::from_columns(&columns));
        }
        if let Some(base_query) = &config.base_query {
            engine = engine.with_base_query(base_query.clone());
        }

        info!(
            backend = config.kind().as_str(),
            table = %table,
            "SSRM service ready"
        );

        Ok(Self { engine, config })
    }

    /// Run one grid request
    pub async fn query(&self, request: &GridRequest) -> Result<SsrmResponse> {
        Ok(self.engine.execute(request).await?.into())
    }

    /// Parse a raw payload and run it
    pub async fn query_json(&self, payload: serde_json::Value) -> Result<SsrmResponse> {
        let request = GridRequest::from_value(payload)?;
        self.query(&request).await
    }

    /// Statements `request` would run
    pub fn explain(&self, request: &GridRequest) -> Result<QueryPlan> {
        self.engine.explain(request)
    }

    /// Columns and total row count of the configured table
    pub async fn table_info(&self) -> Result<TableInfo> {
        let connection = self.engine.connection();
        let table = self.engine.table();

        let columns = connection.get_table_columns(table).await?;
        let total_rows = connection.get_table_count(table).await?;

        Ok(TableInfo {
            table_name: table.name.clone(),
            total_rows,
            columns,
        })
    }

    pub fn stats(&self) -> QueryStats {
        self.engine.stats()
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.engine.connection().close().await;
    }
}

/// Build the statements for `request` without a backend connection
pub fn explain_offline(config: &BackendConfig, request: &GridRequest) -> Result<QueryPlan> {
    config.validate()?;
    let table = config.table_ref();
    query::QueryBuilder::new(request, &table, config.dialect())
        .with_base_query(config.base_query.as_deref())
        .build()
}
