//! Revert applied changes, newest first.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::change::Change;
use crate::changelog::Changelog;
use crate::connection::Connection;
use crate::error::MigrateResult;
use crate::hook::{HookContext, MigrationHook};
use crate::operations::{run_script, sorted_changes, validate_steps};
use crate::options::DatabaseOperationOption;
use crate::runner::ScriptRunner;

/// Note recorded when there is nothing to revert.
pub const NOTHING_APPLIED: &str = "Changelog exist, but no migration found.";

/// Note recorded when a rollback script removed the changelog table.
pub const CHANGELOG_GONE: &str =
    "Changelog doesn't exist. No further migrations will be undone (normal for the last migration).";

/// Result of a revert batch.
#[derive(Debug, Clone, Default)]
pub struct RollbackResult {
    /// Reverted changes, newest first.
    pub reverted: Vec<Change>,
    /// Total duration.
    pub duration: Duration,
    /// Non-fatal notes.
    pub notes: Vec<String>,
}

impl RollbackResult {
    /// Number of reverted changes.
    pub fn reverted_count(&self) -> usize {
        self.reverted.len()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        if self.reverted.is_empty() {
            "No migrations reverted".to_string()
        } else {
            format!(
                "{} reverted in {}ms",
                self.reverted.len(),
                self.duration.as_millis()
            )
        }
    }
}

/// Reverts the most recently applied changes.
#[derive(Debug, Clone)]
pub struct DownOperation {
    steps: usize,
    args: Vec<String>,
}

impl Default for DownOperation {
    fn default() -> Self {
        Self {
            steps: 1,
            args: Vec::new(),
        }
    }
}

impl DownOperation {
    /// Create the operation. Without `steps` exactly one change is reverted.
    pub fn new(steps: Option<usize>) -> MigrateResult<Self> {
        Ok(Self {
            steps: validate_steps(steps)?.unwrap_or(1),
            ..Default::default()
        })
    }

    /// Set the arguments handed to hooks.
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Number of changes to revert.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run the operation.
    ///
    /// Fails with a persistence error when the changelog table does not exist.
    pub fn operate(
        &self,
        conn: &mut dyn Connection,
        catalog: &dyn Catalog,
        options: &DatabaseOperationOption,
        runner: &dyn ScriptRunner,
        mut hook: Option<&mut dyn MigrationHook>,
    ) -> MigrateResult<RollbackResult> {
        let started = Instant::now();
        let mut result = RollbackResult::default();

        let Some(mut target) = Changelog::new(conn, options).last_applied()? else {
            warn!("{}", NOTHING_APPLIED);
            result.notes.push(NOTHING_APPLIED.to_string());
            return Ok(result);
        };

        let mut changes = sorted_changes(catalog)?;
        changes.reverse();

        let mut stopped = false;
        for change in changes {
            if change.id != target.id {
                continue;
            }

            if let Some(hook) = hook.as_deref_mut() {
                if result.reverted.is_empty() {
                    hook.before(&mut HookContext::new(conn, runner, options, &self.args))?;
                }
                hook.before_each(
                    &mut HookContext::new(conn, runner, options, &self.args).with_change(&change),
                )?;
            }

            info!("Undoing: {}", change.display_name());
            let script_started = Instant::now();
            let script = catalog.rollback_script_for(&change)?;
            run_script(conn, runner, options, script)?;
            let elapsed = script_started.elapsed();

            let changelog_gone = {
                let mut changelog = Changelog::new(conn, options);
                if changelog.exists() {
                    changelog.delete(&change)?;
                    false
                } else {
                    warn!("{}", CHANGELOG_GONE);
                    result.notes.push(CHANGELOG_GONE.to_string());
                    true
                }
            };

            if let Some(hook) = hook.as_deref_mut() {
                hook.after_each(
                    &mut HookContext::new(conn, runner, options, &self.args)
                        .with_change(&change)
                        .with_execution_time(elapsed),
                )?;
            }

            result.reverted.push(change);
            if changelog_gone || result.reverted.len() >= self.steps {
                stopped = true;
                break;
            }

            match Changelog::new(conn, options).last_applied()? {
                Some(next) => target = next,
                None => {
                    stopped = true;
                    break;
                }
            }
        }

        if !stopped {
            let note = format!(
                "Applied change {} is not in the catalog. No further migrations will be undone.",
                target.id
            );
            warn!("{}", note);
            result.notes.push(note);
        }

        if !result.reverted.is_empty() {
            if let Some(hook) = hook.as_deref_mut() {
                hook.after(&mut HookContext::new(conn, runner, options, &self.args))?;
            }
        }

        result.duration = started.elapsed();
        Ok(result)
    }
}
