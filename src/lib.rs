//! # Shale
//!
//! Versioned SQL migrations for any database with a driver.
//!
//! Shale provides:
//! - Ordered apply and revert of changes kept in a scripts directory
//! - A changelog table recording which changes are applied
//! - Lifecycle hooks around batches and single changes, in Rust or as scripts
//! - Abort scripts run when a change fails partway through a batch
//! - Status reports, bootstrapping, gap filling and offline script rendering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shale::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrationConfig::load("shale.toml")?;
//!     let provider = SqliteProvider::from_url("sqlite://./app.db")?;
//!     let engine = MigrationEngine::from_config(provider, &config);
//!
//!     let mut hook = ScriptedHook::for_up(&config, &ScriptEngineRegistry::new())?;
//!     let result = engine.up(None, Some(&mut hook))?;
//!     println!("{}", result.summary());
//!     println!("{}", engine.status()?);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration engine, catalogs, hooks and operations.
pub mod migrate {
    pub use shale_migrate::*;
}

/// SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use shale_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use shale_migrate::{
        Catalog, Change, Connection, ConnectionProvider, DatabaseOperationOption, FileCatalog,
        HookContext, InMemoryCatalog, MigrateResult, MigrationConfig, MigrationEngine,
        MigrationError, MigrationHook, ScriptEngineRegistry, ScriptOperation, ScriptedHook,
    };

    #[cfg(feature = "sqlite")]
    pub use shale_sqlite::{SqliteConfig, SqliteProvider};
}

// Re-export key types at the crate root
pub use shale_migrate::{MigrateResult, MigrationEngine, MigrationError};
