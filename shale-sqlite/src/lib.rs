//! SQLite driver for Shale migrations.
//!
//! This crate implements the `shale-migrate` connection traits on top of
//! `rusqlite`, so a [`MigrationEngine`](shale_migrate::MigrationEngine) can
//! run against SQLite files or in-memory databases.
//!
//! # Example
//!
//! ```rust,ignore
//! use shale_migrate::{FileCatalog, MigrationEngine};
//! use shale_sqlite::SqliteProvider;
//!
//! let provider = SqliteProvider::from_url("sqlite://./app.db")?;
//! let engine = MigrationEngine::new(provider, FileCatalog::new("./scripts"));
//! engine.up(None, None)?;
//! ```

pub mod config;
pub mod connection;
pub mod error;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use connection::{SqliteConnection, SqliteProvider};
pub use error::{SqliteError, SqliteResult};
