//! Database operations: apply, revert, status and friends.
//!
//! Every operation works on a connection it is handed and never closes it;
//! [`MigrationEngine`](crate::engine::MigrationEngine) owns connection lifetimes.

mod bootstrap;
mod down;
mod pending;
mod script;
mod status;
mod up;
mod version;

pub use bootstrap::{BOOTSTRAP_REFUSED, BootstrapOperation, BootstrapResult};
pub use down::{CHANGELOG_GONE, DownOperation, NOTHING_APPLIED, RollbackResult};
pub use pending::{NO_CHANGELOG, PendingOperation};
pub use script::{ScriptMode, ScriptOperation};
pub use status::{MigrationStatus, StatusOperation};
pub use up::{MigrationResult, UpOperation};
pub use version::{VersionOperation, VersionResult};

use crate::catalog::Catalog;
use crate::change::Change;
use crate::connection::Connection;
use crate::error::{MigrateResult, MigrationError};
use crate::options::DatabaseOperationOption;
use crate::runner::{Script, ScriptRunner};

/// The full catalog, ascending by id.
pub(crate) fn sorted_changes(catalog: &dyn Catalog) -> MigrateResult<Vec<Change>> {
    let mut changes = catalog.list_changes()?;
    changes.sort();
    Ok(changes)
}

/// Reject a zero step count.
pub(crate) fn validate_steps(steps: Option<usize>) -> MigrateResult<Option<usize>> {
    match steps {
        Some(0) => Err(MigrationError::configuration(
            "step must be a positive number or None",
        )),
        steps => Ok(steps),
    }
}

/// Run a script, tagging failures with its name.
pub(crate) fn run_script(
    conn: &mut dyn Connection,
    runner: &dyn ScriptRunner,
    options: &DatabaseOperationOption,
    script: Script,
) -> MigrateResult<()> {
    let name = script.name().to_string();
    runner
        .run(conn, script, options)
        .map_err(|e| MigrationError::script(name, e))
}
