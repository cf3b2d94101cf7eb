//! Seed a fresh database.

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::changelog::Changelog;
use crate::connection::Connection;
use crate::error::MigrateResult;
use crate::operations::run_script;
use crate::options::DatabaseOperationOption;
use crate::runner::ScriptRunner;

/// Note recorded when bootstrapping is refused.
pub const BOOTSTRAP_REFUSED: &str = "For your safety, the bootstrapping will only run before \
     migrations are applied (i.e. before the changelog exists). If you're certain, you can run \
     it with force enabled.";

/// Result of a bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapResult {
    /// Names of the scripts that ran, in order.
    pub scripts: Vec<String>,
    /// Non-fatal notes.
    pub notes: Vec<String>,
}

impl BootstrapResult {
    /// Whether bootstrapping was refused because the changelog exists.
    pub fn skipped(&self) -> bool {
        self.scripts.is_empty() && !self.notes.is_empty()
    }
}

/// Runs the catalog's bootstrap scripts.
///
/// Scripts only run while the changelog table is absent, unless forced.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapOperation {
    force: bool,
}

impl BootstrapOperation {
    /// Create the operation.
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    /// Run the operation.
    pub fn operate(
        &self,
        conn: &mut dyn Connection,
        catalog: &dyn Catalog,
        options: &DatabaseOperationOption,
        runner: &dyn ScriptRunner,
    ) -> MigrateResult<BootstrapResult> {
        let mut result = BootstrapResult::default();

        if Changelog::new(conn, options).exists() && !self.force {
            warn!("{}", BOOTSTRAP_REFUSED);
            result.notes.push(BOOTSTRAP_REFUSED.to_string());
            return Ok(result);
        }

        for script in catalog.bootstrap_scripts()? {
            let name = script.name().to_string();
            info!("Bootstrapping: {}", name);
            run_script(conn, runner, options, script)?;
            result.scripts.push(name);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::operations::tests::FakeDatabase;
    use crate::runner::SqlScriptRunner;

    fn bootstrap(db: &mut FakeDatabase, force: bool) -> BootstrapResult {
        let catalog = InMemoryCatalog::new()
            .bootstrap("CREATE SCHEMA app;")
            .bootstrap("GRANT ALL ON app;");
        BootstrapOperation::new(force)
            .operate(
                db,
                &catalog,
                &DatabaseOperationOption::default(),
                &SqlScriptRunner::new(),
            )
            .unwrap()
    }

    #[test]
    fn test_runs_without_changelog() {
        let mut db = FakeDatabase::default();
        let result = bootstrap(&mut db, false);

        assert_eq!(result.scripts, vec!["bootstrap[0]", "bootstrap[1]"]);
        assert_eq!(db.statements, vec!["CREATE SCHEMA app", "GRANT ALL ON app"]);
        assert!(!result.skipped());
    }

    #[test]
    fn test_refused_with_changelog() {
        let mut db = FakeDatabase::with_changelog(&[]);
        let result = bootstrap(&mut db, false);

        assert!(result.skipped());
        assert_eq!(result.notes, vec![BOOTSTRAP_REFUSED.to_string()]);
        assert!(db.statements.is_empty());
    }

    #[test]
    fn test_forced_with_changelog() {
        let mut db = FakeDatabase::with_changelog(&[1]);
        let result = bootstrap(&mut db, true);

        assert_eq!(result.scripts.len(), 2);
        assert_eq!(db.statements.len(), 2);
    }
}
