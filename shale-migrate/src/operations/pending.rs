//! Apply every change missing from the changelog, including gaps.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::changelog::Changelog;
use crate::connection::Connection;
use crate::error::{MigrateResult, MigrationError};
use crate::hook::MigrationHook;
use crate::operations::sorted_changes;
use crate::operations::up::{MigrationResult, apply_changes};
use crate::options::DatabaseOperationOption;
use crate::runner::ScriptRunner;

/// Error message when the changelog table is absent.
pub const NO_CHANGELOG: &str =
    "Change log doesn't exist, no migrations applied. Try running 'up' instead.";

/// Applies every catalog change without a changelog row, ascending.
///
/// Unlike [`UpOperation`](crate::operations::UpOperation) this also applies
/// changes older than the last applied one.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingOperation;

impl PendingOperation {
    /// Create the operation.
    pub fn new() -> Self {
        Self
    }

    /// Run the operation. Requires an existing changelog.
    pub fn operate(
        &self,
        conn: &mut dyn Connection,
        catalog: &dyn Catalog,
        options: &DatabaseOperationOption,
        runner: &dyn ScriptRunner,
        hook: Option<&mut dyn MigrationHook>,
    ) -> MigrateResult<MigrationResult> {
        let applied: BTreeSet<Decimal> = {
            let mut changelog = Changelog::new(conn, options);
            if !changelog.exists() {
                return Err(MigrationError::configuration(NO_CHANGELOG));
            }
            changelog.entries()?.into_iter().map(|c| c.id).collect()
        };

        let pending = sorted_changes(catalog)?
            .into_iter()
            .filter(|change| !applied.contains(&change.id))
            .collect();

        apply_changes(conn, catalog, options, runner, hook, pending, None)
    }
}
