//! MySQL backend

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, MySql, MySqlPool, Row as _, TypeInfo, ValueRef};
use tracing::{info, warn};

use super::{columns_from_rows, run_statement, Connection};
use crate::config::{BackendConfig, BackendKind, ConnectionDescriptor};
use crate::query::sql::{Dialect, SqlParam, Statement, TableRef};
use crate::types::{ColumnInfo, Row, Value};
use crate::{Error, Result};

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Pooled connection to a MySQL server
#[derive(Debug, Clone)]
pub struct MySqlConnection {
    pool: MySqlPool,
    dialect: Dialect,
    timeout: Duration,
}

impl MySqlConnection {
    pub async fn open(config: &BackendConfig) -> Result<Self> {
        let ConnectionDescriptor::Mysql {
            host,
            port,
            database,
            user,
            password,
        } = &config.connection
        else {
            return Err(Error::configuration("not a MySQL backend configuration"));
        };

        info!(host = %host, port, database = %database, "Connecting to MySQL");

        let options = MySqlConnectOptions::new()
            .host(host)
            .port(*port)
            .database(database)
            .username(user)
            .password(password);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.statement_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::connection(format!(
                    "failed to connect to MySQL at {}:{}/{}: {}",
                    host, port, database, e
                ))
            })?;

        info!(
            host = %host,
            database = %database,
            max_connections = config.max_connections,
            "MySQL connection pool ready"
        );

        Ok(Self {
            pool,
            dialect: config.dialect(),
            timeout: config.statement_timeout(),
        })
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    fn kind(&self) -> BackendKind {
        BackendKind::Mysql
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
        let mut statement = Statement::raw(
            "SELECT COLUMN_NAME AS column_name, COLUMN_TYPE AS column_type \
             FROM information_schema.COLUMNS WHERE TABLE_SCHEMA = ",
        );
        match &table.schema {
            Some(schema) => {
                statement.push_param(SqlParam::Text(schema.clone()));
            }
            None => {
                statement.push_sql("DATABASE()");
            }
        }
        statement.push_sql(" AND TABLE_NAME = ");
        statement.push_param(SqlParam::Text(table.name.clone()));
        statement.push_sql(" ORDER BY ORDINAL_POSITION");

        let rows = self.execute_query(&statement).await?;
        Ok(columns_from_rows(&rows))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_param<'q>(query: MySqlQuery<'q>, param: &'q SqlParam) -> MySqlQuery<'q> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Integer(v) => query.bind(*v),
        SqlParam::Real(v) => query.bind(*v),
        SqlParam::Text(v) => query.bind(v.as_str()),
    }
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let value = decode_value(row, index, column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

/// Decode by the column's declared type
///
/// DECIMAL becomes a float, temporal types become ISO-8601 text and JSON
/// documents become nested values. Anything else is tried as text, integer,
/// float and finally raw bytes.
fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(e) => {
            warn!(index, error = %e, "Failed to read MySQL value");
            return Value::Null;
        }
    }

    let decoded = match type_name {
        "BOOLEAN" => row.try_get::<bool, _>(index).map(Value::Boolean).ok(),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(index).map(Value::Integer).ok()
        }
        unsigned if unsigned.ends_with("UNSIGNED") => {
            row.try_get::<u64, _>(index).ok().map(|v| match i64::try_from(v) {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Float(v as f64),
            })
        }
        "FLOAT" => row
            .try_get::<f32, _>(index)
            .map(|v| Value::Float(f64::from(v)))
            .ok(),
        "DOUBLE" => row.try_get::<f64, _>(index).map(Value::Float).ok(),
        "DECIMAL" => row.try_get::<Decimal, _>(index).ok().map(decimal_value),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
            .ok(),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|dt| Value::Text(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .ok(),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map(|t| Value::Text(t.format("%H:%M:%S%.f").to_string()))
            .ok(),
        "JSON" => row
            .try_get::<serde_json::Value, _>(index)
            .map(Value::from)
            .ok(),
        _ => None,
    };

    decoded
        .or_else(|| decode_fallback(row, index))
        .unwrap_or_else(|| {
            warn!(index, type_name, "Unsupported MySQL value");
            Value::Null
        })
}

fn decode_fallback(row: &MySqlRow, index: usize) -> Option<Value> {
    if let Ok(s) = row.try_get::<String, _>(index) {
        return Some(Value::Text(s));
    }
    if let Ok(i) = row.try_get::<i64, _>(index) {
        return Some(Value::Integer(i));
    }
    if let Ok(f) = row.try_get::<f64, _>(index) {
        return Some(Value::Float(f));
    }
    row.try_get::<Vec<u8>, _>(index)
        .ok()
        .map(|bytes| match String::from_utf8(bytes) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Blob(e.into_bytes()),
        })
}

fn decimal_value(decimal: Decimal) -> Value {
    match decimal.to_f64() {
        Some(f) => Value::Float(f),
        None => Value::Text(decimal.to_string()),
    }
}
