//! Catalog of changes defined in code.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::change::Change;
use crate::error::{MigrateResult, MigrationError};
use crate::runner::Script;

#[derive(Debug, Clone)]
struct Entry {
    change: Change,
    up: String,
    down: String,
}

/// Catalog holding its changes in memory.
///
/// ```rust,ignore
/// let catalog = InMemoryCatalog::new()
///     .change(1, "create users", "CREATE TABLE users (id INT);", "DROP TABLE users;")
///     .on_abort("DELETE FROM audit WHERE pending = 1;");
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: BTreeMap<Decimal, Entry>,
    on_abort: Option<String>,
    bootstrap: Vec<String>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a change with its apply and rollback scripts. A later change with the
    /// same id replaces the earlier one.
    pub fn change(
        mut self,
        id: impl Into<Decimal>,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        let change = Change::new(id.into(), description);
        self.entries.insert(
            change.id,
            Entry {
                change,
                up: up.into(),
                down: down.into(),
            },
        );
        self
    }

    /// Set the abort script, run for whichever change fails.
    pub fn on_abort(mut self, script: impl Into<String>) -> Self {
        self.on_abort = Some(script.into());
        self
    }

    /// Add a bootstrap script.
    pub fn bootstrap(mut self, script: impl Into<String>) -> Self {
        self.bootstrap.push(script.into());
        self
    }

    fn entry(&self, change: &Change) -> MigrateResult<&Entry> {
        self.entries
            .get(&change.id)
            .ok_or_else(|| MigrationError::resource(format!("no change {} in catalog", change.id)))
    }
}

impl Catalog for InMemoryCatalog {
    fn list_changes(&self) -> MigrateResult<Vec<Change>> {
        Ok(self.entries.values().map(|e| e.change.clone()).collect())
    }

    fn script_for(&self, change: &Change) -> MigrateResult<Script> {
        let entry = self.entry(change)?;
        Ok(Script::from_string(change.display_name(), entry.up.clone()))
    }

    fn rollback_script_for(&self, change: &Change) -> MigrateResult<Script> {
        let entry = self.entry(change)?;
        Ok(Script::from_string(change.display_name(), entry.down.clone()))
    }

    fn abort_script_for(&self, change: &Change) -> MigrateResult<Option<Script>> {
        Ok(self
            .on_abort
            .as_ref()
            .map(|sql| Script::from_string(format!("onabort({})", change.id), sql.clone())))
    }

    fn bootstrap_scripts(&self) -> MigrateResult<Vec<Script>> {
        Ok(self
            .bootstrap
            .iter()
            .enumerate()
            .map(|(i, sql)| Script::from_string(format!("bootstrap[{}]", i), sql.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_are_ordered() {
        let catalog = InMemoryCatalog::new()
            .change(2, "second", "SELECT 2;", "")
            .change(1, "first", "SELECT 1;", "");

        let changes = catalog.list_changes().unwrap();
        assert_eq!(changes[0].description, "first");
        assert_eq!(changes[1].description, "second");
    }

    #[test]
    fn test_scripts() {
        let catalog = InMemoryCatalog::new()
            .change(1, "first", "SELECT 1;", "SELECT -1;")
            .bootstrap("SELECT 0;");
        let change = Change::new(Decimal::ONE, "first");

        assert_eq!(catalog.script_for(&change).unwrap().into_string().unwrap(), "SELECT 1;");
        assert_eq!(
            catalog.rollback_script_for(&change).unwrap().into_string().unwrap(),
            "SELECT -1;"
        );
        assert!(catalog.abort_script_for(&change).unwrap().is_none());
        assert_eq!(catalog.bootstrap_scripts().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_change() {
        let catalog = InMemoryCatalog::new();
        let err = catalog.script_for(&Change::new(Decimal::TEN, "")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resource);
    }
}
