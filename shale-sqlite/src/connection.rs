//! SQLite connections and the provider that opens them.

use rusqlite::types::{Value, ValueRef};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use shale_migrate::{Connection, ConnectionProvider, DatabaseError, MigrateResult, Row, SqlValue};
use tracing::{debug, instrument, trace};

use crate::config::SqliteConfig;
use crate::error::{SqliteError, SqliteResult};

/// A synchronous SQLite connection.
///
/// With autocommit off, a transaction is opened lazily by the first write and
/// stays open until [`commit`](Connection::commit) or
/// [`rollback`](Connection::rollback).
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    auto_commit: bool,
}

impl SqliteConnection {
    /// Open a connection and apply the configured pragmas.
    pub fn open(config: &SqliteConfig) -> SqliteResult<Self> {
        let target = config.path.open_target();
        let conn = rusqlite::Connection::open(&target).map_err(|e| {
            SqliteError::connection(format!("unable to open {}: {}", target, e))
        })?;
        if let Some(timeout) = config.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        for pragma in config.pragmas() {
            drain(&conn, &pragma)?;
        }
        debug!(target = %target, "Opened SQLite connection");
        Ok(Self {
            conn,
            auto_commit: true,
        })
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// The underlying rusqlite connection.
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }

    fn begin_if_needed(&mut self) -> SqliteResult<()> {
        if !self.auto_commit && self.conn.is_autocommit() {
            trace!("BEGIN");
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

/// Run one statement to completion, discarding any rows.
fn drain(conn: &rusqlite::Connection, sql: &str) -> SqliteResult<()> {
    if sql.trim().is_empty() {
        return Ok(());
    }
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.raw_query();
    while rows.next()?.is_some() {}
    Ok(())
}

fn to_sqlite(value: &SqlValue) -> SqliteResult<Value> {
    Ok(match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Decimal(d) => decimal_to_sqlite(*d)?,
        SqlValue::Text(s) => Value::Text(s.clone()),
    })
}

fn bind_all(params: &[SqlValue]) -> SqliteResult<Vec<Value>> {
    params.iter().map(to_sqlite).collect()
}

/// Bind a decimal so that it reads back as the same number.
///
/// SQLite stores `NUMERIC` values as 64-bit integers or doubles. A decimal
/// that fits neither exactly is refused instead of being rounded.
fn decimal_to_sqlite(d: Decimal) -> SqliteResult<Value> {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Ok(Value::Integer(i));
        }
    }
    let real = d.to_f64().filter(|f| f.is_finite());
    match real {
        Some(f) if f.to_string().parse::<Decimal>().is_ok_and(|back| back == d) => {
            Ok(Value::Real(f))
        }
        _ => Err(SqliteError::value(format!(
            "{} cannot be stored exactly as a SQLite number",
            d
        ))),
    }
}

fn to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl Connection for SqliteConnection {
    #[instrument(level = "debug", skip(self, params))]
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize, DatabaseError> {
        let values = bind_all(params)?;
        self.begin_if_needed()?;
        let count = self
            .conn
            .execute(sql, rusqlite::params_from_iter(values))
            .map_err(SqliteError::from)?;
        Ok(count)
    }

    #[instrument(level = "debug", skip(self, params))]
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DatabaseError> {
        let values = bind_all(params)?;
        let mut stmt = self.conn.prepare(sql).map_err(SqliteError::from)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(values))
            .map_err(SqliteError::from)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(SqliteError::from)? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(to_text))
                .collect::<Result<Vec<_>, _>>()
                .map_err(SqliteError::from)?;
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }

    #[instrument(level = "debug", skip(self))]
    fn execute_statement(&mut self, sql: &str) -> Result<(), DatabaseError> {
        self.begin_if_needed()?;
        drain(&self.conn, sql)?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, sql), fields(len = sql.len()))]
    fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError> {
        self.begin_if_needed()?;
        self.conn.execute_batch(sql).map_err(SqliteError::from)?;
        Ok(())
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DatabaseError> {
        if auto_commit && self.in_transaction() {
            self.commit()?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        if self.in_transaction() {
            trace!("COMMIT");
            self.conn.execute_batch("COMMIT").map_err(SqliteError::from)?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        if self.in_transaction() {
            trace!("ROLLBACK");
            self.conn.execute_batch("ROLLBACK").map_err(SqliteError::from)?;
        }
        Ok(())
    }
}

/// Opens [`SqliteConnection`]s for the migration engine.
///
/// For an in-memory database the provider keeps one connection of its own
/// open, so the database outlives the per-operation connections.
#[derive(Debug)]
pub struct SqliteProvider {
    config: SqliteConfig,
    keeper: Option<SqliteConnection>,
}

impl SqliteProvider {
    /// Create a provider.
    pub fn new(config: SqliteConfig) -> SqliteResult<Self> {
        let keeper = if config.path.is_memory() {
            Some(SqliteConnection::open(&config)?)
        } else {
            None
        };
        Ok(Self { config, keeper })
    }

    /// Create a provider from a SQLite URL.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        Self::new(SqliteConfig::from_url(url)?)
    }

    /// A provider over a fresh in-memory database.
    pub fn memory() -> SqliteResult<Self> {
        Self::new(SqliteConfig::memory())
    }

    /// The configuration.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Whether the provider holds an in-memory database open.
    pub fn is_keeping_alive(&self) -> bool {
        self.keeper.is_some()
    }

    /// Open a connection.
    pub fn open(&self) -> SqliteResult<SqliteConnection> {
        SqliteConnection::open(&self.config)
    }
}

impl ConnectionProvider for SqliteProvider {
    type Connection = SqliteConnection;

    fn connect(&self) -> MigrateResult<SqliteConnection> {
        Ok(self.open()?)
    }
}
