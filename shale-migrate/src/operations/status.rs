//! Applied/pending report.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::change::Change;
use crate::changelog::Changelog;
use crate::connection::Connection;
use crate::error::MigrateResult;
use crate::operations::sorted_changes;
use crate::options::DatabaseOperationOption;

/// Migration status information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Every catalog change, ascending. Applied ones carry their timestamp.
    pub changes: Vec<Change>,
    /// Changelog rows with no catalog entry.
    pub missing: Vec<Change>,
    /// Number of applied catalog changes.
    pub applied_count: usize,
    /// Number of pending catalog changes.
    pub pending_count: usize,
}

impl MigrationStatus {
    /// Catalog changes without a changelog row.
    pub fn pending(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| !c.is_applied())
    }

    /// Catalog changes with a changelog row.
    pub fn applied(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.is_applied())
    }

    /// Get a summary of the status.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} applied, {} pending",
            self.applied_count, self.pending_count
        );
        if !self.missing.is_empty() {
            summary.push_str(&format!(", {} missing from catalog", self.missing.len()));
        }
        summary
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID             Applied At          Description")?;
        writeln!(f, "{}", "=".repeat(80))?;
        for change in &self.changes {
            writeln!(f, "{}", change)?;
        }
        for change in &self.missing {
            writeln!(f, "{} (missing from catalog)", change)?;
        }
        write!(f, "{}", self.summary())
    }
}

/// Computes which catalog changes are applied and which are pending.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusOperation;

impl StatusOperation {
    /// Create the operation.
    pub fn new() -> Self {
        Self
    }

    /// Run the operation. Read-only.
    pub fn operate(
        &self,
        conn: &mut dyn Connection,
        catalog: &dyn Catalog,
        options: &DatabaseOperationOption,
    ) -> MigrateResult<MigrationStatus> {
        let mut changelog = Changelog::new(conn, options);
        let mut applied: BTreeMap<Decimal, Change> = if changelog.exists() {
            changelog
                .entries()?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        } else {
            BTreeMap::new()
        };

        let mut status = MigrationStatus::default();
        for mut change in sorted_changes(catalog)? {
            match applied.remove(&change.id) {
                Some(row) => {
                    change.applied_timestamp = row.applied_timestamp;
                    status.applied_count += 1;
                }
                None => status.pending_count += 1,
            }
            status.changes.push(change);
        }
        status.missing = applied.into_values().collect();

        Ok(status)
    }
}
