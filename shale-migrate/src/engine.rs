//! Migration engine implementation.

use rust_decimal::Decimal;
use tracing::debug;

use crate::catalog::{Catalog, FileCatalog};
use crate::config::MigrationConfig;
use crate::connection::ConnectionProvider;
use crate::error::MigrateResult;
use crate::hook::MigrationHook;
use crate::operations::{
    BootstrapOperation, BootstrapResult, DownOperation, MigrationResult, MigrationStatus,
    PendingOperation, RollbackResult, ScriptOperation, StatusOperation, UpOperation,
    VersionOperation, VersionResult,
};
use crate::options::DatabaseOperationOption;
use crate::runner::{ScriptRunner, SqlScriptRunner};

/// Front door to every operation.
///
/// Each call opens one connection from the provider, runs a single operation on
/// it and drops it before returning, whatever the outcome.
pub struct MigrationEngine<P: ConnectionProvider, C: Catalog> {
    provider: P,
    catalog: C,
    options: DatabaseOperationOption,
    runner: Box<dyn ScriptRunner>,
}

impl<P: ConnectionProvider> MigrationEngine<P, FileCatalog> {
    /// Create an engine over the scripts directory and options of a config.
    pub fn from_config(provider: P, config: &MigrationConfig) -> Self {
        Self::new(provider, FileCatalog::new(config.paths.script_path()))
            .with_options(config.database.clone())
    }
}

impl<P: ConnectionProvider, C: Catalog> MigrationEngine<P, C> {
    /// Create an engine with default options and the SQL script runner.
    pub fn new(provider: P, catalog: C) -> Self {
        Self {
            provider,
            catalog,
            options: DatabaseOperationOption::default(),
            runner: Box::new(SqlScriptRunner::new()),
        }
    }

    /// Set the database operation options.
    pub fn with_options(mut self, options: DatabaseOperationOption) -> Self {
        self.options = options;
        self
    }

    /// Set the script runner.
    pub fn with_runner(mut self, runner: impl ScriptRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// The database operation options.
    pub fn options(&self) -> &DatabaseOperationOption {
        &self.options
    }

    /// The catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// The connection provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Apply pending changes, at most `steps` of them.
    pub fn up(
        &self,
        steps: Option<usize>,
        hook: Option<&mut dyn MigrationHook>,
    ) -> MigrateResult<MigrationResult> {
        let op = UpOperation::new(steps)?;
        let mut conn = self.provider.connect()?;
        debug!(steps = ?steps, "Running up");
        op.operate(&mut conn, &self.catalog, &self.options, &*self.runner, hook)
    }

    /// Revert the last `steps` changes, one when `None`.
    pub fn down(
        &self,
        steps: Option<usize>,
        hook: Option<&mut dyn MigrationHook>,
    ) -> MigrateResult<RollbackResult> {
        self.down_with_args(steps, Vec::new(), hook)
    }

    /// Revert the last `steps` changes, handing `args` to the hook.
    pub fn down_with_args(
        &self,
        steps: Option<usize>,
        args: Vec<String>,
        hook: Option<&mut dyn MigrationHook>,
    ) -> MigrateResult<RollbackResult> {
        let op = DownOperation::new(steps)?.args(args);
        let mut conn = self.provider.connect()?;
        debug!(steps = op.steps(), "Running down");
        op.operate(&mut conn, &self.catalog, &self.options, &*self.runner, hook)
    }

    /// Report applied and pending changes.
    pub fn status(&self) -> MigrateResult<MigrationStatus> {
        let mut conn = self.provider.connect()?;
        StatusOperation::new().operate(&mut conn, &self.catalog, &self.options)
    }

    /// Run the bootstrap scripts.
    pub fn bootstrap(&self, force: bool) -> MigrateResult<BootstrapResult> {
        let mut conn = self.provider.connect()?;
        debug!(force, "Running bootstrap");
        BootstrapOperation::new(force).operate(&mut conn, &self.catalog, &self.options, &*self.runner)
    }

    /// Apply every change without a changelog row.
    pub fn pending(&self, hook: Option<&mut dyn MigrationHook>) -> MigrateResult<MigrationResult> {
        let mut conn = self.provider.connect()?;
        debug!("Running pending");
        PendingOperation::new().operate(&mut conn, &self.catalog, &self.options, &*self.runner, hook)
    }

    /// Migrate up or down until `version` is the last applied change.
    pub fn version(
        &self,
        version: Decimal,
        up_hook: Option<&mut dyn MigrationHook>,
        down_hook: Option<&mut dyn MigrationHook>,
    ) -> MigrateResult<VersionResult> {
        let mut conn = self.provider.connect()?;
        debug!(%version, "Running version");
        VersionOperation::new(version).operate(
            &mut conn,
            &self.catalog,
            &self.options,
            &*self.runner,
            up_hook,
            down_hook,
        )
    }

    /// Render a migration script. Connects only when the changelog is needed.
    pub fn script(&self, op: &ScriptOperation) -> MigrateResult<String> {
        if op.needs_changelog() {
            let mut conn = self.provider.connect()?;
            op.operate(Some(&mut conn), &self.catalog, &self.options)
        } else {
            op.operate(None, &self.catalog, &self.options)
        }
    }
}
