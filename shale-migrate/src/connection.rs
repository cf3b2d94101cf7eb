//! The low-level database seam used by the engine.
//!
//! Drivers implement [`Connection`] and [`ConnectionProvider`]; the engine only
//! ever talks to the database through these traits.

use std::error::Error as StdError;
use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::MigrateResult;

/// A failure reported by a database driver.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DatabaseError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl DatabaseError {
    /// Create a database error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database error wrapping a driver error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Integer value.
    Integer(i64),
    /// Exact decimal value.
    Decimal(Decimal),
    /// Text value.
    Text(String),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// A result row, with every value rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Create a row from column names and their values.
    pub fn new(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column name (case-insensitive).
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
            .and_then(|v| v.as_deref())
    }

    /// Get a value by position.
    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A live database connection.
///
/// A connection starts in autocommit mode. When autocommit is switched off,
/// statements accumulate in a transaction until [`commit`](Connection::commit)
/// or [`rollback`](Connection::rollback).
pub trait Connection {
    /// Execute a parameterized statement, returning the affected row count.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize, DatabaseError>;

    /// Run a parameterized query and collect every row.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DatabaseError>;

    /// Execute one script statement. Any result rows are discarded.
    fn execute_statement(&mut self, sql: &str) -> Result<(), DatabaseError>;

    /// Execute a multi-statement batch in one call.
    fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError>;

    /// Switch autocommit mode. Turning autocommit on commits any open transaction.
    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DatabaseError>;

    /// Commit the open transaction, if any.
    fn commit(&mut self) -> Result<(), DatabaseError>;

    /// Roll back the open transaction, if any.
    fn rollback(&mut self) -> Result<(), DatabaseError>;

    /// Drain warnings raised by the last statements.
    fn take_warnings(&mut self) -> Vec<String> {
        Vec::new()
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize, DatabaseError> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DatabaseError> {
        (**self).query(sql, params)
    }

    fn execute_statement(&mut self, sql: &str) -> Result<(), DatabaseError> {
        (**self).execute_statement(sql)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError> {
        (**self).execute_batch(sql)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DatabaseError> {
        (**self).set_auto_commit(auto_commit)
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        (**self).rollback()
    }

    fn take_warnings(&mut self) -> Vec<String> {
        (**self).take_warnings()
    }
}

/// Opens connections to the target database.
///
/// The engine opens one connection per operation and drops it before returning,
/// so dropping a connection must release it.
pub trait ConnectionProvider {
    /// The connection type handed out.
    type Connection: Connection;

    /// Open a new connection.
    fn connect(&self) -> MigrateResult<Self::Connection>;
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    type Connection = P::Connection;

    fn connect(&self) -> MigrateResult<Self::Connection> {
        (**self).connect()
    }
}
