//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;

use rust_decimal::Decimal;
use shale::migrate::{
    Catalog, Change, Connection, ConnectionProvider, HookContext, InMemoryCatalog, MigrateResult,
    MigrationHook, Script, create_table_sql,
};
use shale::sqlite::SqliteProvider;

/// Install a test subscriber once; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Four changes: the changelog itself, a table, a column and a second table.
pub fn schema_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .change(1, "create changelog", create_table_sql("CHANGELOG"), "DROP TABLE CHANGELOG;")
        .change(2, "create users", "CREATE TABLE users (id INTEGER PRIMARY KEY);", "DROP TABLE users;")
        .change(
            3,
            "add email",
            "ALTER TABLE users ADD COLUMN email TEXT;",
            "ALTER TABLE users DROP COLUMN email;",
        )
        .change(4, "create posts", "CREATE TABLE posts (id INTEGER PRIMARY KEY);", "DROP TABLE posts;")
}

/// Ids in the changelog, ascending. Empty when the table is missing.
pub fn changelog_ids(provider: &SqliteProvider) -> Vec<i64> {
    let mut conn = provider.connect().unwrap();
    match conn.query("SELECT ID FROM CHANGELOG ORDER BY ID", &[]) {
        Ok(rows) => rows
            .iter()
            .map(|row| row.get_index(0).unwrap().parse().unwrap())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Whether a table exists.
pub fn table_exists(provider: &SqliteProvider, table: &str) -> bool {
    let mut conn = provider.connect().unwrap();
    let rows = conn
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[table.into()],
        )
        .unwrap();
    !rows.is_empty()
}

/// Whether a column exists on a table.
pub fn column_exists(provider: &SqliteProvider, table: &str, column: &str) -> bool {
    let mut conn = provider.connect().unwrap();
    conn.query(&format!("SELECT name FROM pragma_table_info('{}')", table), &[])
        .unwrap()
        .iter()
        .any(|row| row.get_index(0) == Some(column))
}

/// Hook recording each callback as `<point>` or `<point>:<id>`.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<String>,
    pub timed: usize,
    pub stamped: usize,
}

impl Recorder {
    fn record(&mut self, point: &str, ctx: &HookContext<'_>) {
        let event = match &ctx.change {
            Some(change) => format!("{}:{}", point, change.id),
            None => point.to_string(),
        };
        self.events.push(event);
    }
}

impl MigrationHook for Recorder {
    fn before(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        self.record("before", ctx);
        Ok(())
    }

    fn before_each(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        self.record("before_each", ctx);
        Ok(())
    }

    fn after_each(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        self.record("after_each", ctx);
        if ctx.execution_time_ms().is_some() {
            self.timed += 1;
        }
        if ctx.change.as_ref().is_some_and(Change::is_applied) {
            self.stamped += 1;
        }
        Ok(())
    }

    fn after(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        self.record("after", ctx);
        Ok(())
    }
}

/// Catalog wrapper counting abort script lookups per change.
pub struct AbortCounting<C> {
    pub inner: C,
    pub requested: RefCell<Vec<Decimal>>,
}

impl<C> AbortCounting<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            requested: RefCell::new(Vec::new()),
        }
    }
}

impl<C: Catalog> Catalog for AbortCounting<C> {
    fn list_changes(&self) -> MigrateResult<Vec<Change>> {
        self.inner.list_changes()
    }

    fn script_for(&self, change: &Change) -> MigrateResult<Script> {
        self.inner.script_for(change)
    }

    fn rollback_script_for(&self, change: &Change) -> MigrateResult<Script> {
        self.inner.rollback_script_for(change)
    }

    fn abort_script_for(&self, change: &Change) -> MigrateResult<Option<Script>> {
        self.requested.borrow_mut().push(change.id);
        self.inner.abort_script_for(change)
    }

    fn bootstrap_scripts(&self) -> MigrateResult<Vec<Script>> {
        self.inner.bootstrap_scripts()
    }
}
