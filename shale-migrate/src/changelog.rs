//! Changelog tracking.
//!
//! The changelog is a table in the target database holding one row per applied
//! change: `(ID, APPLIED_AT, DESCRIPTION)`. Every operation here goes through the
//! [`Connection`] seam, so it works for any driver.

use std::str::FromStr;

use chrono::Local;
use rust_decimal::Decimal;
use tracing::debug;

use crate::change::Change;
use crate::connection::{Connection, DatabaseError, SqlValue};
use crate::error::{MigrateResult, MigrationError};
use crate::options::DatabaseOperationOption;

/// Timestamp format of the `APPLIED_AT` column.
pub const APPLIED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current wall-clock time, formatted for the `APPLIED_AT` column.
pub fn applied_timestamp() -> String {
    Local::now().format(APPLIED_AT_FORMAT).to_string()
}

/// DDL for the changelog table.
///
/// `ID` is declared `NUMERIC(20,0)`, but the range a driver actually stores is
/// its own. SQLite keeps whole ids up to `i64::MAX` (19 digits) exactly, plus
/// ids that are exact doubles, and refuses anything else on insert.
pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE {table} (\n\
         ID NUMERIC(20,0) NOT NULL PRIMARY KEY,\n\
         APPLIED_AT VARCHAR(25) NOT NULL,\n\
         DESCRIPTION VARCHAR(255) NOT NULL\n\
         );\n"
    )
}

/// Changelog operations bound to one connection.
pub struct Changelog<'a> {
    conn: &'a mut dyn Connection,
    table: &'a str,
}

impl<'a> Changelog<'a> {
    /// Bind the changelog named in `options` to a connection.
    pub fn new(conn: &'a mut dyn Connection, options: &'a DatabaseOperationOption) -> Self {
        Self {
            conn,
            table: &options.changelog_table,
        }
    }

    /// Probe for the changelog table.
    ///
    /// Any failure of the probe query counts as "does not exist".
    pub fn exists(&mut self) -> bool {
        let sql = format!("select ID, APPLIED_AT, DESCRIPTION from {}", self.table);
        match self.conn.query(&sql, &[]) {
            Ok(_) => true,
            Err(err) => {
                debug!(table = %self.table, error = %err, "Changelog probe failed");
                false
            }
        }
    }

    /// All changelog rows, ordered by id.
    pub fn entries(&mut self) -> MigrateResult<Vec<Change>> {
        let sql = format!(
            "select ID, APPLIED_AT, DESCRIPTION from {} order by ID",
            self.table
        );
        let rows = self.conn.query(&sql, &[]).map_err(|e| {
            MigrationError::persistence("Error querying last applied migration", e)
        })?;

        let mut changes = rows
            .iter()
            .map(|row| {
                let id = row.get("ID").unwrap_or_default();
                let id = Decimal::from_str(id.trim()).map_err(|e| {
                    MigrationError::persistence(
                        format!("Invalid id '{}' in changelog table {}", id, self.table),
                        DatabaseError::with_source("unparseable changelog id", e),
                    )
                })?;
                Ok(Change {
                    id,
                    description: row.get("DESCRIPTION").unwrap_or_default().to_string(),
                    applied_timestamp: row.get("APPLIED_AT").map(str::to_string),
                    filename: None,
                })
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        changes.sort();
        Ok(changes)
    }

    /// The applied change with the highest id.
    pub fn last_applied(&mut self) -> MigrateResult<Option<Change>> {
        Ok(self.entries()?.pop())
    }

    /// Record a change as applied, stamping its applied timestamp.
    pub fn insert(&mut self, change: &mut Change) -> MigrateResult<()> {
        change.applied_timestamp = Some(applied_timestamp());
        let sql = format!(
            "insert into {} (ID, APPLIED_AT, DESCRIPTION) values (?,?,?)",
            self.table
        );
        let params = [
            SqlValue::from(change.id),
            SqlValue::from(change.applied_timestamp.clone().unwrap_or_default()),
            SqlValue::from(change.description.as_str()),
        ];

        debug!(id = %change.id, "Inserting changelog row");
        self.conn
            .execute(&sql, &params)
            .and_then(|_| self.conn.commit())
            .map_err(|e| {
                MigrationError::persistence(format!("Error inserting changelog row {}", change.id), e)
            })?;
        Ok(())
    }

    /// Remove a change from the changelog and commit.
    pub fn delete(&mut self, change: &Change) -> MigrateResult<()> {
        let sql = format!("delete from {} where ID = ?", self.table);

        debug!(id = %change.id, "Deleting changelog row");
        self.conn
            .execute(&sql, &[SqlValue::from(change.id)])
            .and_then(|_| self.conn.commit())
            .map_err(|e| {
                MigrationError::persistence(format!("Error deleting changelog row {}", change.id), e)
            })?;
        Ok(())
    }
}
