//! Backend configuration for the SSRM query engine
//!
//! A [`BackendConfig`] is built once at process start and shared read-only
//! by every request afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::query::sql::{Dialect, TableRef};
use crate::{Error, Result};

/// Default table queried when none is configured
pub const DEFAULT_TABLE_NAME: &str = "demo_data";

/// Default SQLite database file
pub const DEFAULT_DATABASE_NAME: &str = "demo_data.db";

/// Default MySQL port
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Which backend to talk to and how to reach it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectionDescriptor {
    /// Embedded file-based engine
    Sqlite {
        /// Database file path
        path: PathBuf,
    },
    /// Client-server engine
    Mysql {
        host: String,
        #[serde(default = "default_mysql_port")]
        port: u16,
        database: String,
        user: String,
        password: String,
    },
}

impl ConnectionDescriptor {
    /// Short backend name used in logs
    pub fn kind(&self) -> BackendKind {
        match self {
            ConnectionDescriptor::Sqlite { .. } => BackendKind::Sqlite,
            ConnectionDescriptor::Mysql { .. } => BackendKind::Mysql,
        }
    }
}

/// Supported backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Mysql,
}

impl BackendKind {
    /// Identifier quote character of this backend's dialect
    pub fn default_quote(self) -> char {
        match self {
            BackendKind::Sqlite => '"',
            BackendKind::Mysql => '`',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Mysql => "mysql",
        }
    }
}

/// Process-wide backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend kind and connection parameters
    #[serde(flatten)]
    pub connection: ConnectionDescriptor,

    /// Target table name
    #[serde(default = "default_table")]
    pub table: String,

    /// Optional schema qualifier for the table
    #[serde(default)]
    pub schema: Option<String>,

    /// Identifier quote character; defaults per backend kind
    #[serde(default)]
    pub quote_char: Option<char>,

    /// Per-statement timeout in milliseconds
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    /// Connection pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Reject identifiers that are not columns of the table
    #[serde(default = "default_true")]
    pub validate_columns: bool,

    /// `SELECT ... FROM ...` used for non-grouped requests instead of `SELECT *`
    #[serde(default)]
    pub base_query: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::for_sqlite(DEFAULT_DATABASE_NAME, DEFAULT_TABLE_NAME)
    }
}

impl BackendConfig {
    /// Create configuration for a SQLite database file
    pub fn for_sqlite(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self::with_connection(
            ConnectionDescriptor::Sqlite { path: path.into() },
            table,
        )
    }

    /// Create configuration for a MySQL database
    pub fn for_mysql(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self::with_connection(
            ConnectionDescriptor::Mysql {
                host: host.into(),
                port,
                database: database.into(),
                user: user.into(),
                password: password.into(),
            },
            table,
        )
    }

    fn with_connection(connection: ConnectionDescriptor, table: impl Into<String>) -> Self {
        Self {
            connection,
            table: table.into(),
            schema: None,
            quote_char: None,
            statement_timeout_ms: default_statement_timeout_ms(),
            max_connections: default_max_connections(),
            validate_columns: true,
            base_query: None,
        }
    }

    /// Backend kind
    pub fn kind(&self) -> BackendKind {
        self.connection.kind()
    }

    /// Effective identifier quote character
    pub fn quote(&self) -> char {
        self.quote_char.unwrap_or_else(|| self.kind().default_quote())
    }

    /// SQL dialect derived from the quote character
    pub fn dialect(&self) -> Dialect {
        Dialect::new(self.quote())
    }

    /// Fully qualified target table
    pub fn table_ref(&self) -> TableRef {
        TableRef {
            schema: self.schema.clone(),
            name: self.table.clone(),
        }
    }

    /// Statement timeout as a duration
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    /// Check required parameters; called before any connection is opened
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(Error::configuration("table name must not be empty"));
        }
        if matches!(&self.schema, Some(s) if s.trim().is_empty()) {
            return Err(Error::configuration("schema name must not be empty"));
        }
        if !matches!(self.quote(), '"' | '`') {
            return Err(Error::configuration(format!(
                "unsupported identifier quote character {:?}",
                self.quote()
            )));
        }
        if self.statement_timeout_ms == 0 {
            return Err(Error::configuration(
                "statement_timeout_ms must be greater than zero",
            ));
        }
        if self.max_connections == 0 {
            return Err(Error::configuration(
                "max_connections must be greater than zero",
            ));
        }

        match &self.connection {
            ConnectionDescriptor::Sqlite { path } => {
                if path.as_os_str().is_empty() {
                    return Err(Error::configuration("SQLite requires a database path"));
                }
            }
            ConnectionDescriptor::Mysql {
                host,
                database,
                user,
                password,
                ..
            } => {
                if [host, database, user, password]
                    .iter()
                    .any(|v| v.trim().is_empty())
                {
                    return Err(Error::configuration(
                        "MySQL requires host, database, user, and password parameters",
                    ));
                }
            }
        }

        Ok(())
    }
}

fn default_table() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_mysql_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

fn default_statement_timeout_ms() -> u64 {
    30_000
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}
