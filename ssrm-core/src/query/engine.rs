//! Query orchestrator
//!
//! Builds the main and count statements from one request snapshot, runs the
//! count first and the page second, and formats the rows. Any failure aborts
//! the whole request; a partial result is never returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use super::builder::{QueryBuilder, QueryPlan};
use super::request::GridRequest;
use super::sql::{Dialect, TableRef};
use crate::connection::Connection;
use crate::formatter::{self, JsonRow};
use crate::schema::ColumnWhitelist;
use crate::Result;

/// Total count and formatted page of one request
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Rows (or distinct groups) matching the request's WHERE predicate
    pub total_count: u64,
    pub rows: Vec<JsonRow>,
}

/// Response envelope returned to the grid
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsrmResponse {
    pub row_data: Vec<JsonRow>,
    pub row_count: u64,
}

impl From<QueryOutcome> for SsrmResponse {
    fn from(outcome: QueryOutcome) -> Self {
        Self {
            row_data: outcome.rows,
            row_count: outcome.total_count,
        }
    }
}

/// Query execution statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Requests executed
    pub total_queries: u64,
    /// Requests that failed to build or execute
    pub error_queries: u64,
    /// Average wall time per successful request in microseconds
    pub avg_execution_time_us: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    total: AtomicU64,
    errors: AtomicU64,
    elapsed_us: AtomicU64,
}

/// Runs grid requests against one table of one backend
#[derive(Debug)]
pub struct QueryEngine {
    connection: Arc<dyn Connection>,
    table: TableRef,
    dialect: Dialect,
    whitelist: Option<ColumnWhitelist>,
    base_query: Option<String>,
    stats: StatsCounters,
}

impl QueryEngine {
    pub fn new(connection: Arc<dyn Connection>, table: TableRef) -> Self {
        let dialect = connection.dialect();
        Self {
            connection,
            table,
            dialect,
            whitelist: None,
            base_query: None,
            stats: StatsCounters::default(),
        }
    }

    /// Validate every identifier against `whitelist`
    pub fn with_whitelist(mut self, whitelist: ColumnWhitelist) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    /// Projection used for non-grouped requests instead of `SELECT *`
    pub fn with_base_query(mut self, base_query: impl Into<String>) -> Self {
        self.base_query = Some(base_query.into());
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Build the statements for `request` without executing them
    pub fn explain(&self, request: &GridRequest) -> Result<QueryPlan> {
        QueryBuilder::new(request, &self.table, self.dialect)
            .with_base_query(self.base_query.as_deref())
            .with_whitelist(self.whitelist.as_ref())
            .build()
    }

    /// Run `request`: count query, then page query, then formatting
    pub async fn execute(&self, request: &GridRequest) -> Result<QueryOutcome> {
        let start = Instant::now();
        self.stats.total.fetch_add(1, Ordering::Relaxed);

        let result = self.run(request).await;
        match &result {
            Ok(outcome) => {
                let elapsed = start.elapsed();
                self.stats
                    .elapsed_us
                    .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
                info!(
                    table = %self.table,
                    rows = outcome.rows.len(),
                    total_count = outcome.total_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Processed grid request"
                );
            }
            Err(_) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    async fn run(&self, request: &GridRequest) -> Result<QueryOutcome> {
        let plan = self.explain(request)?;

        let total_count = self
            .connection
            .execute_count_query(&plan.count_query)
            .await?;
        let rows = self.connection.execute_query(&plan.query).await?;
        debug!(fetched = rows.len(), total_count, "Fetched grid page");

        Ok(QueryOutcome {
            total_count,
            rows: formatter::format_rows(&rows),
        })
    }

    pub fn stats(&self) -> QueryStats {
        let total = self.stats.total.load(Ordering::Relaxed);
        let errors = self.stats.errors.load(Ordering::Relaxed);
        let succeeded = total.saturating_sub(errors);
        let elapsed_us = self.stats.elapsed_us.load(Ordering::Relaxed);

        QueryStats {
            total_queries: total,
            error_queries: errors,
            avg_execution_time_us: if succeeded == 0 {
                0
            } else {
                elapsed_us / succeeded
            },
        }
    }
}
