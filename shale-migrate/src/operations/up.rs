//! Apply pending changes.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::change::Change;
use crate::changelog::Changelog;
use crate::connection::Connection;
use crate::error::{MigrateResult, MigrationError};
use crate::hook::{HookContext, MigrationHook};
use crate::operations::{run_script, sorted_changes, validate_steps};
use crate::options::DatabaseOperationOption;
use crate::runner::ScriptRunner;

/// Result of an apply batch.
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    /// Applied changes, in order, stamped with their applied timestamps.
    pub applied: Vec<Change>,
    /// Total duration.
    pub duration: Duration,
    /// Non-fatal notes.
    pub notes: Vec<String>,
}

impl MigrationResult {
    /// Number of applied changes.
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Check if any change was applied.
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        if self.applied.is_empty() {
            "No migrations applied".to_string()
        } else {
            format!(
                "{} applied in {}ms",
                self.applied.len(),
                self.duration.as_millis()
            )
        }
    }
}

/// Applies every change newer than the last applied one, ascending.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpOperation {
    steps: Option<usize>,
}

impl UpOperation {
    /// Create the operation. `steps`, when given, must be at least 1.
    pub fn new(steps: Option<usize>) -> MigrateResult<Self> {
        Ok(Self {
            steps: validate_steps(steps)?,
        })
    }

    /// Maximum number of changes to apply.
    pub fn steps(&self) -> Option<usize> {
        self.steps
    }

    /// Run the operation.
    pub fn operate(
        &self,
        conn: &mut dyn Connection,
        catalog: &dyn Catalog,
        options: &DatabaseOperationOption,
        runner: &dyn ScriptRunner,
        hook: Option<&mut dyn MigrationHook>,
    ) -> MigrateResult<MigrationResult> {
        let last = {
            let mut changelog = Changelog::new(conn, options);
            if changelog.exists() {
                changelog.last_applied()?
            } else {
                None
            }
        };

        let pending: Vec<Change> = sorted_changes(catalog)?
            .into_iter()
            .filter(|change| last.as_ref().is_none_or(|last| change.id > last.id))
            .collect();

        apply_changes(conn, catalog, options, runner, hook, pending, self.steps)
    }
}

/// Apply `pending` in order, firing hooks and recording each change.
///
/// When a change's script fails at runtime, the catalog's abort script for that
/// change runs before the failure is returned. Rows written for earlier changes
/// are kept.
pub(crate) fn apply_changes(
    conn: &mut dyn Connection,
    catalog: &dyn Catalog,
    options: &DatabaseOperationOption,
    runner: &dyn ScriptRunner,
    mut hook: Option<&mut dyn MigrationHook>,
    pending: Vec<Change>,
    steps: Option<usize>,
) -> MigrateResult<MigrationResult> {
    let started = Instant::now();
    let mut applied = Vec::new();

    for mut change in pending {
        if let Some(hook) = hook.as_deref_mut() {
            if applied.is_empty() {
                hook.before(&mut HookContext::new(conn, runner, options, &[]))?;
            }
            hook.before_each(&mut HookContext::new(conn, runner, options, &[]).with_change(&change))?;
        }

        info!("Applying: {}", change.display_name());
        let script_started = Instant::now();
        if let Err(err) = catalog
            .script_for(&change)
            .and_then(|script| run_script(conn, runner, options, script))
        {
            return Err(abort(conn, catalog, options, runner, &change, err));
        }
        let elapsed = script_started.elapsed();

        Changelog::new(conn, options).insert(&mut change)?;

        if let Some(hook) = hook.as_deref_mut() {
            hook.after_each(
                &mut HookContext::new(conn, runner, options, &[])
                    .with_change(&change)
                    .with_execution_time(elapsed),
            )?;
        }

        applied.push(change);
        if steps.is_some_and(|steps| applied.len() >= steps) {
            break;
        }
    }

    if !applied.is_empty() {
        if let Some(hook) = hook.as_deref_mut() {
            hook.after(&mut HookContext::new(conn, runner, options, &[]))?;
        }
    }

    Ok(MigrationResult {
        applied,
        duration: started.elapsed(),
        notes: Vec::new(),
    })
}

/// Run the abort script bound to `change`, if any, and return the error to report.
fn abort(
    conn: &mut dyn Connection,
    catalog: &dyn Catalog,
    options: &DatabaseOperationOption,
    runner: &dyn ScriptRunner,
    change: &Change,
    err: MigrationError,
) -> MigrationError {
    if !err.is_script_runtime() {
        return err;
    }

    let script = match catalog.abort_script_for(change) {
        Ok(Some(script)) => script,
        Ok(None) => return err,
        Err(lookup) => {
            warn!(change = %change.id, error = %lookup, "Unable to load abort script");
            return err;
        }
    };

    let name = script.name().to_string();
    info!("Aborting: {}", name);
    match runner.run(conn, script, options) {
        Ok(()) => err,
        Err(source) => MigrationError::AbortFailed {
            script: name,
            source,
            original: Box::new(err),
        },
    }
}
