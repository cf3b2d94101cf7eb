//! Render migration SQL for offline execution.

use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::change::Change;
use crate::changelog::applied_timestamp;
use crate::connection::Connection;
use crate::error::{MigrateResult, MigrationError};
use crate::operations::{StatusOperation, sorted_changes};
use crate::options::DatabaseOperationOption;

/// Which changes a [`ScriptOperation`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Changes in `(from, to]` when upgrading, or `(to, from]` undone when
    /// downgrading.
    Range {
        /// Starting version.
        from: Decimal,
        /// Target version.
        to: Decimal,
    },
    /// Changes without a changelog row, ascending.
    Pending,
    /// Undo scripts of changes without a changelog row, descending.
    PendingUndo,
}

/// Produces a SQL script from the catalog without running it.
///
/// Each change is rendered as a `-- <name>` header, its script and the matching
/// changelog `INSERT` (or `DELETE` when undoing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOperation {
    mode: ScriptMode,
}

impl ScriptOperation {
    /// Script the changes between two versions. Use `0` as `from` to include the
    /// first change.
    pub fn range(from: Decimal, to: Decimal) -> MigrateResult<Self> {
        if from == to {
            return Err(MigrationError::configuration(
                "The script command requires two different versions. Use 0 to include the first version.",
            ));
        }
        Ok(Self {
            mode: ScriptMode::Range { from, to },
        })
    }

    /// Script every pending change.
    pub fn pending() -> Self {
        Self {
            mode: ScriptMode::Pending,
        }
    }

    /// Script the undo of every pending change.
    pub fn pending_undo() -> Self {
        Self {
            mode: ScriptMode::PendingUndo,
        }
    }

    /// The selected mode.
    pub fn mode(&self) -> ScriptMode {
        self.mode
    }

    /// Whether this renders undo scripts.
    pub fn is_undo(&self) -> bool {
        match self.mode {
            ScriptMode::Range { from, to } => from > to,
            ScriptMode::Pending => false,
            ScriptMode::PendingUndo => true,
        }
    }

    /// Whether this needs the changelog to pick its changes.
    pub fn needs_changelog(&self) -> bool {
        !matches!(self.mode, ScriptMode::Range { .. })
    }

    /// Render the script. `conn` is only read for the pending modes.
    pub fn operate(
        &self,
        conn: Option<&mut dyn Connection>,
        catalog: &dyn Catalog,
        options: &DatabaseOperationOption,
    ) -> MigrateResult<String> {
        let mut changes = match (self.mode, conn) {
            (ScriptMode::Range { from, to }, _) => {
                let (low, high) = if from < to { (from, to) } else { (to, from) };
                sorted_changes(catalog)?
                    .into_iter()
                    .filter(|c| c.id > low && c.id <= high)
                    .collect::<Vec<_>>()
            }
            (_, Some(conn)) => StatusOperation::new()
                .operate(conn, catalog, options)?
                .changes
                .into_iter()
                .filter(|c| !c.is_applied())
                .collect(),
            (_, None) => {
                return Err(MigrationError::configuration(
                    "Pending scripts need a database connection",
                ));
            }
        };

        let undo = self.is_undo();
        if undo {
            changes.reverse();
        }

        let mut out = String::new();
        for change in &changes {
            let script = if undo {
                catalog.rollback_script_for(change)?
            } else {
                catalog.script_for(change)?
            };
            let name = change.display_name();
            let content = script
                .into_string()
                .map_err(|e| MigrationError::io(format!("unable to read script '{}'", name), e))?;

            let statement = if undo {
                delete_statement(change, options)
            } else {
                insert_statement(change, options)
            };

            out.push_str(&format!(
                "-- {}\n{}\n\n{}\n\n",
                name,
                content.trim_end(),
                statement
            ));
        }

        Ok(out)
    }
}

fn insert_statement(change: &Change, options: &DatabaseOperationOption) -> String {
    format!(
        "INSERT INTO {} (ID, APPLIED_AT, DESCRIPTION) VALUES ({}, '{}', '{}'){}",
        options.changelog_table,
        change.id,
        applied_timestamp(),
        change.description.replace('\'', " "),
        options.statement_terminator()
    )
}

fn delete_statement(change: &Change, options: &DatabaseOperationOption) -> String {
    format!(
        "DELETE FROM {} WHERE ID = {}{}",
        options.changelog_table,
        change.id,
        options.statement_terminator()
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::error::ErrorKind;
    use crate::operations::tests::{FakeDatabase, numbered_catalog};

    #[test]
    fn test_range_up() {
        let op = ScriptOperation::range(Decimal::ZERO, Decimal::from(2)).unwrap();
        assert!(!op.is_undo());
        let script = op
            .operate(None, &numbered_catalog(3), &DatabaseOperationOption::default())
            .unwrap();

        assert!(script.starts_with("-- 1\nAPPLY 1;\n\nINSERT INTO CHANGELOG (ID, APPLIED_AT, DESCRIPTION) VALUES (1, '"));
        assert!(script.contains("'change 1');\n\n-- 2\nAPPLY 2;\n\n"));
        assert!(!script.contains("APPLY 3"));
    }

    #[test]
    fn test_range_down() {
        let op = ScriptOperation::range(Decimal::from(3), Decimal::from(1)).unwrap();
        assert!(op.is_undo());
        let script = op
            .operate(None, &numbered_catalog(3), &DatabaseOperationOption::default())
            .unwrap();

        assert_eq!(
            script,
            "-- 3\nREVERT 3;\n\nDELETE FROM CHANGELOG WHERE ID = 3;\n\n\
             -- 2\nREVERT 2;\n\nDELETE FROM CHANGELOG WHERE ID = 2;\n\n"
        );
    }

    #[test]
    fn test_equal_versions_rejected() {
        let err = ScriptOperation::range(Decimal::ONE, Decimal::ONE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_pending_modes() {
        let mut db = FakeDatabase::with_changelog(&[1]);
        let catalog = numbered_catalog(3);
        let options = DatabaseOperationOption::default();

        let script = ScriptOperation::pending()
            .operate(Some(&mut db), &catalog, &options)
            .unwrap();
        assert!(script.starts_with("-- 2\n"));
        assert!(script.contains("-- 3\n"));
        assert!(!script.contains("-- 1\n"));

        let script = ScriptOperation::pending_undo()
            .operate(Some(&mut db), &catalog, &options)
            .unwrap();
        assert!(script.starts_with("-- 3\nREVERT 3;"));

        let err = ScriptOperation::pending()
            .operate(None, &catalog, &options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_quotes_and_full_line_delimiter() {
        let catalog = InMemoryCatalog::new().change(1, "don't panic", "SELECT 1\nGO\n", "");
        let options = DatabaseOperationOption::default()
            .delimiter("GO")
            .full_line_delimiter(true);
        let script = ScriptOperation::range(Decimal::ZERO, Decimal::ONE)
            .unwrap()
            .operate(None, &catalog, &options)
            .unwrap();

        assert!(script.contains("'don t panic')\nGO\n\n"));
    }
}
