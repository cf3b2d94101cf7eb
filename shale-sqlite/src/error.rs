//! Error types for the SQLite driver.

use std::fmt;

use shale_migrate::{DatabaseError, MigrationError};

/// Result type for SQLite driver operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite driver operations.
#[derive(Debug)]
pub enum SqliteError {
    /// Error reported by SQLite itself.
    Sqlite(rusqlite::Error),
    /// Invalid driver configuration.
    Config(String),
    /// The database could not be opened.
    Connection(String),
    /// A bound value has no exact SQLite representation.
    Value(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a value error.
    pub fn value(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }
}

impl fmt::Display for SqliteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "SQLite error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Connection(msg) => write!(f, "Connection error: {}", msg),
            Self::Value(msg) => write!(f, "Value error: {}", msg),
        }
    }
}

impl std::error::Error for SqliteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

impl From<SqliteError> for DatabaseError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Sqlite(e) => DatabaseError::with_source(e.to_string(), e),
            other => DatabaseError::new(other.to_string()),
        }
    }
}

impl From<SqliteError> for MigrationError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Config(msg) => MigrationError::configuration(msg),
            other => MigrationError::persistence("Unable to open SQLite database", other.into()),
        }
    }
}
