//! Lifecycle hooks around apply and revert batches.
//!
//! A batch fires `before` ahead of its first change and `after` once it is done,
//! and only when it performs at least one change. Each change is bracketed by
//! `before_each` and `after_each`.

mod script;

pub use script::{
    HookScriptSpec, PluggableScript, ScriptEngine, ScriptEngineRegistry, ScriptedHook,
    SQL_LANGUAGE,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::connection::Connection;
use crate::error::MigrateResult;
use crate::options::DatabaseOperationOption;
use crate::runner::ScriptRunner;

/// Everything a hook callback may use.
///
/// A fresh context is built for every callback. The change is an owned clone, so
/// hooks can never alter the engine's working set.
pub struct HookContext<'a> {
    /// Connection of the running operation.
    pub conn: &'a mut dyn Connection,
    /// Runner of the running operation.
    pub runner: &'a dyn ScriptRunner,
    /// Options of the running operation.
    pub options: &'a DatabaseOperationOption,
    /// The change being applied or reverted, `None` for batch callbacks.
    pub change: Option<Change>,
    /// Time spent running the change's script, only set for `after_each`.
    pub execution_time: Option<Duration>,
    /// Free-form arguments of the batch.
    pub args: &'a [String],
}

impl<'a> HookContext<'a> {
    /// Create a batch-level context.
    pub fn new(
        conn: &'a mut dyn Connection,
        runner: &'a dyn ScriptRunner,
        options: &'a DatabaseOperationOption,
        args: &'a [String],
    ) -> Self {
        Self {
            conn,
            runner,
            options,
            change: None,
            execution_time: None,
            args,
        }
    }

    /// Attach a snapshot of the current change.
    pub fn with_change(mut self, change: &Change) -> Self {
        self.change = Some(change.clone());
        self
    }

    /// Attach the elapsed script time.
    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = Some(elapsed);
        self
    }

    /// Elapsed script time in milliseconds, if known.
    pub fn execution_time_ms(&self) -> Option<u128> {
        self.execution_time.map(|d| d.as_millis())
    }
}

/// Callbacks fired around a batch and around each change in it.
///
/// Every callback defaults to doing nothing. A failing callback aborts the
/// operation with its error.
pub trait MigrationHook {
    /// Fired once, before the first change of a non-empty batch.
    fn before(&mut self, _ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        Ok(())
    }

    /// Fired before each change.
    fn before_each(&mut self, _ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        Ok(())
    }

    /// Fired after each change, with the elapsed time.
    fn after_each(&mut self, _ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        Ok(())
    }

    /// Fired once, after the last change of a non-empty batch.
    fn after(&mut self, _ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        Ok(())
    }
}

impl<H: MigrationHook + ?Sized> MigrationHook for Box<H> {
    fn before(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        (**self).before(ctx)
    }

    fn before_each(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        (**self).before_each(ctx)
    }

    fn after_each(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        (**self).after_each(ctx)
    }

    fn after(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        (**self).after(ctx)
    }
}

/// Hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHook;

impl MigrationHook for NoOpHook {}

/// Hook script entries, as read from the `[hooks]` table.
///
/// Each entry has the form `<language>:<file>[:<key>=<value>...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookSettings {
    /// Run before an apply batch.
    pub before_up: Vec<String>,
    /// Run before each applied change.
    pub before_each_up: Vec<String>,
    /// Run after each applied change.
    pub after_each_up: Vec<String>,
    /// Run after an apply batch.
    pub after_up: Vec<String>,
    /// Run before a revert batch.
    pub before_down: Vec<String>,
    /// Run before each reverted change.
    pub before_each_down: Vec<String>,
    /// Run after each reverted change.
    pub after_each_down: Vec<String>,
    /// Run after a revert batch.
    pub after_down: Vec<String>,
}

impl HookSettings {
    /// Whether no hook script is configured.
    pub fn is_empty(&self) -> bool {
        [
            &self.before_up,
            &self.before_each_up,
            &self.after_each_up,
            &self.after_up,
            &self.before_down,
            &self.before_each_down,
            &self.after_each_down,
            &self.after_down,
        ]
        .iter()
        .all(|entries| entries.is_empty())
    }
}
