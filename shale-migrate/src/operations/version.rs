//! Migrate up or down to a specific version.

use rust_decimal::Decimal;
use tracing::info;

use crate::catalog::Catalog;
use crate::changelog::Changelog;
use crate::connection::Connection;
use crate::error::{MigrateResult, MigrationError};
use crate::hook::MigrationHook;
use crate::operations::{DownOperation, MigrationResult, RollbackResult, UpOperation, sorted_changes};
use crate::options::DatabaseOperationOption;
use crate::runner::ScriptRunner;

/// Outcome of a [`VersionOperation`].
#[derive(Debug, Clone)]
pub enum VersionResult {
    /// Changes were applied to reach the version.
    Upgraded(MigrationResult),
    /// Changes were reverted to reach the version.
    Downgraded(RollbackResult),
    /// The last applied change already is the version.
    AlreadyAt(Decimal),
}

impl VersionResult {
    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        match self {
            Self::Upgraded(result) => result.summary(),
            Self::Downgraded(result) => result.summary(),
            Self::AlreadyAt(version) => format!("Already at version: {}", version),
        }
    }
}

/// Applies or reverts changes until `version` is the last applied one.
#[derive(Debug, Clone, Copy)]
pub struct VersionOperation {
    version: Decimal,
}

impl VersionOperation {
    /// Create the operation.
    pub fn new(version: Decimal) -> Self {
        Self { version }
    }

    /// Target version.
    pub fn version(&self) -> Decimal {
        self.version
    }

    /// Run the operation. The version must exist in the catalog.
    pub fn operate(
        &self,
        conn: &mut dyn Connection,
        catalog: &dyn Catalog,
        options: &DatabaseOperationOption,
        runner: &dyn ScriptRunner,
        up_hook: Option<&mut dyn MigrationHook>,
        down_hook: Option<&mut dyn MigrationHook>,
    ) -> MigrateResult<VersionResult> {
        let changes = sorted_changes(catalog)?;
        if !changes.iter().any(|c| c.id == self.version) {
            return Err(MigrationError::configuration(format!(
                "A migration for the specified version number does not exist: {}",
                self.version
            )));
        }

        let last = {
            let mut changelog = Changelog::new(conn, options);
            if changelog.exists() {
                changelog.last_applied()?.map(|c| c.id)
            } else {
                None
            }
        };

        match last {
            Some(last) if last == self.version => {
                info!("Already at version: {}", self.version);
                Ok(VersionResult::AlreadyAt(self.version))
            }
            Some(last) if last > self.version => {
                let steps = changes
                    .iter()
                    .filter(|c| c.id > self.version && c.id <= last)
                    .count();
                info!("Downgrading to: {}", self.version);
                DownOperation::new(Some(steps.max(1)))?
                    .operate(conn, catalog, options, runner, down_hook)
                    .map(VersionResult::Downgraded)
            }
            last => {
                let steps = changes
                    .iter()
                    .filter(|c| last.is_none_or(|last| c.id > last) && c.id <= self.version)
                    .count();
                info!("Upgrading to: {}", self.version);
                UpOperation::new(Some(steps.max(1)))?
                    .operate(conn, catalog, options, runner, up_hook)
                    .map(VersionResult::Upgraded)
            }
        }
    }
}
