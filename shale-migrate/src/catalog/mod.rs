//! Catalog sources: where changes and their scripts come from.
//!
//! - `FileCatalog` - Scripts directory with one `.sql` file per change
//! - `InMemoryCatalog` - Changes defined in code

mod file;
mod memory;

pub use file::{FileCatalog, BOOTSTRAP_FILE, ONABORT_FILE, UNDO_MARKER};
pub use memory::InMemoryCatalog;

use crate::change::Change;
use crate::error::MigrateResult;
use crate::runner::Script;

/// Enumerates changes and supplies their scripts.
pub trait Catalog {
    /// Every available change, in any order. Bootstrap scripts are not changes.
    fn list_changes(&self) -> MigrateResult<Vec<Change>>;

    /// Script that applies `change`.
    fn script_for(&self, change: &Change) -> MigrateResult<Script>;

    /// Script that reverts `change`.
    fn rollback_script_for(&self, change: &Change) -> MigrateResult<Script>;

    /// Script to run when applying `change` fails, if any.
    fn abort_script_for(&self, change: &Change) -> MigrateResult<Option<Script>>;

    /// Scripts that seed a database that has no changelog yet.
    fn bootstrap_scripts(&self) -> MigrateResult<Vec<Script>>;
}

impl<C: Catalog + ?Sized> Catalog for &C {
    fn list_changes(&self) -> MigrateResult<Vec<Change>> {
        (**self).list_changes()
    }

    fn script_for(&self, change: &Change) -> MigrateResult<Script> {
        (**self).script_for(change)
    }

    fn rollback_script_for(&self, change: &Change) -> MigrateResult<Script> {
        (**self).rollback_script_for(change)
    }

    fn abort_script_for(&self, change: &Change) -> MigrateResult<Option<Script>> {
        (**self).abort_script_for(change)
    }

    fn bootstrap_scripts(&self) -> MigrateResult<Vec<Script>> {
        (**self).bootstrap_scripts()
    }
}

impl<C: Catalog + ?Sized> Catalog for Box<C> {
    fn list_changes(&self) -> MigrateResult<Vec<Change>> {
        (**self).list_changes()
    }

    fn script_for(&self, change: &Change) -> MigrateResult<Script> {
        (**self).script_for(change)
    }

    fn rollback_script_for(&self, change: &Change) -> MigrateResult<Script> {
        (**self).rollback_script_for(change)
    }

    fn abort_script_for(&self, change: &Change) -> MigrateResult<Option<Script>> {
        (**self).abort_script_for(change)
    }

    fn bootstrap_scripts(&self) -> MigrateResult<Vec<Script>> {
        (**self).bootstrap_scripts()
    }
}
