//! # shale-migrate
//!
//! Migration execution engine for Shale.
//!
//! This crate provides functionality for:
//! - Applying and reverting versioned changes in id order
//! - Tracking applied changes in a changelog table in the target database
//! - Lifecycle hooks around batches and individual changes
//! - Abort scripts run when a change fails partway through a batch
//! - Status reports, bootstrapping, gap filling and offline script rendering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌───────────────┐
//! │   Catalog    │────▶│   Operation    │────▶│ Script Runner │
//! └──────────────┘     └────────────────┘     └───────────────┘
//!                         │          │                │
//!                         ▼          ▼                ▼
//!                  ┌───────────┐ ┌───────────┐ ┌─────────────┐
//!                  │   Hooks   │ │ Changelog │ │ Connection  │
//!                  └───────────┘ └───────────┘ └─────────────┘
//! ```
//!
//! The engine never talks to a driver directly: everything goes through the
//! [`Connection`] and [`ConnectionProvider`] traits, so any database with a
//! driver implementing them can be migrated.
//!
//! ## Example
//!
//! ```rust,ignore
//! use shale_migrate::{FileCatalog, MigrationEngine};
//!
//! let engine = MigrationEngine::new(provider, FileCatalog::new("./scripts"));
//!
//! let result = engine.up(None, None)?;
//! println!("{}", result.summary());
//!
//! let status = engine.status()?;
//! println!("{}", status);
//! ```
//!
//! ## Scripts Directory
//!
//! ```text
//! scripts/
//! ├── bootstrap.sql                       # Seeds a fresh database
//! ├── onabort.sql                         # Runs when a change fails
//! ├── 20240101120000_create_changelog.sql
//! └── 20240102090000_create_users.sql
//! ```
//!
//! Each change file holds the apply script, a `-- //@UNDO` line and the
//! rollback script.

pub mod catalog;
pub mod change;
pub mod changelog;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod hook;
pub mod operations;
pub mod options;
pub mod runner;

// Re-exports
pub use catalog::{BOOTSTRAP_FILE, Catalog, FileCatalog, InMemoryCatalog, ONABORT_FILE, UNDO_MARKER};
pub use change::Change;
pub use changelog::{APPLIED_AT_FORMAT, Changelog, create_table_sql};
pub use config::{CONFIG_FILE_NAME, MigrationConfig, SelectedPaths};
pub use connection::{Connection, ConnectionProvider, DatabaseError, Row, SqlValue};
pub use engine::MigrationEngine;
pub use error::{ErrorKind, MigrateResult, MigrationError, ScriptError};
pub use hook::{
    HookContext, HookScriptSpec, HookSettings, MigrationHook, NoOpHook, PluggableScript,
    SQL_LANGUAGE, ScriptEngine, ScriptEngineRegistry, ScriptedHook,
};
pub use operations::{
    BOOTSTRAP_REFUSED, BootstrapOperation, BootstrapResult, CHANGELOG_GONE, DownOperation,
    MigrationResult, MigrationStatus, NO_CHANGELOG, NOTHING_APPLIED, PendingOperation,
    RollbackResult, ScriptMode, ScriptOperation, StatusOperation, UpOperation, VersionOperation,
    VersionResult,
};
pub use options::{DEFAULT_CHANGELOG_TABLE, DEFAULT_DELIMITER, DatabaseOperationOption};
pub use runner::{Script, ScriptRunner, SqlScriptRunner};
