//! Error types for the SSRM query engine

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for SSRM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for SSRM operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend configuration errors (raised at startup)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure to open or acquire a backend connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// The incoming grid-state payload could not be parsed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A clause could not be composed from the request
    #[error("Query build error: {0}")]
    Build(String),

    /// Identifier not present in the table schema
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Backend rejected or failed to run a statement
    #[error("Query execution error: {message} (sql: {sql})")]
    QueryExecution { sql: String, message: String },

    /// Statement exceeded the configured timeout
    #[error("Query timed out after {after:?} (sql: {sql})")]
    Timeout { sql: String, after: Duration },
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a query build error
    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    /// Create an unknown column error
    pub fn unknown_column(name: impl Into<String>) -> Self {
        Self::UnknownColumn(name.into())
    }

    /// Create a query execution error carrying the failing SQL
    pub fn query_execution(sql: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            sql: sql.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error carrying the failing SQL
    pub fn timeout(sql: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            sql: sql.into(),
            after,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io(_) => ErrorCategory::System,
            Error::Serialization(_) => ErrorCategory::Data,
            Error::Configuration(_) => ErrorCategory::Configuration,
            Error::Connection(_) => ErrorCategory::Backend,
            Error::InvalidRequest(_) => ErrorCategory::Request,
            Error::Build(_) => ErrorCategory::Query,
            Error::UnknownColumn(_) => ErrorCategory::Query,
            Error::QueryExecution { .. } => ErrorCategory::Backend,
            Error::Timeout { .. } => ErrorCategory::Backend,
        }
    }
}

/// Error categories for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// System-level errors (I/O)
    System,
    /// Data conversion errors
    Data,
    /// Startup configuration errors
    Configuration,
    /// Malformed client payloads
    Request,
    /// SQL composition errors
    Query,
    /// Backend connectivity and execution errors
    Backend,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::System => "System",
            ErrorCategory::Data => "Data",
            ErrorCategory::Configuration => "Configuration",
            ErrorCategory::Request => "Request",
            ErrorCategory::Query => "Query",
            ErrorCategory::Backend => "Backend",
        };
        write!(f, "{}", name)
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Convert from driver errors that happen outside a specific statement
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Connection(err.to_string())
    }
}
