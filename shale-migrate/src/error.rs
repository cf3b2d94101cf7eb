//! Error types for the migration engine.

use thiserror::Error;

use crate::connection::DatabaseError;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Broad classification of a [`MigrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid step count, malformed script configuration, bad config file.
    Configuration,
    /// A catalog entry or script content could not be read.
    Resource,
    /// A statement failed while a script was running.
    ScriptRuntime,
    /// The changelog (or the connection behind it) could not be read or written.
    Persistence,
}

/// Failure raised by a [`ScriptRunner`](crate::runner::ScriptRunner).
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script content could not be read.
    #[error("Error reading script: {0}")]
    Read(#[from] std::io::Error),

    /// A statement was rejected by the database.
    #[error("Error executing: {statement}. Cause: {source}")]
    Statement {
        /// The statement text as sent to the database.
        statement: String,
        /// The database failure.
        #[source]
        source: DatabaseError,
    },

    /// The script ended in the middle of a statement.
    #[error("Line missing end-of-line terminator ({delimiter}) => {statement}")]
    Unterminated {
        /// The trailing statement text.
        statement: String,
        /// The delimiter that was expected.
        delimiter: String,
    },

    /// The database reported a warning and warnings are treated as errors.
    #[error("Warning while executing: {statement}. Warning: {warning}")]
    Warning {
        /// The statement that produced the warning.
        statement: String,
        /// The warning text.
        warning: String,
    },

    /// Committing, rolling back or switching autocommit failed.
    #[error("Transaction error: {0}")]
    Transaction(#[source] DatabaseError),
}

/// Errors that can occur during migration operations.
///
/// This is the single failure type surfaced by every engine entry point. The
/// original cause is always reachable through [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Invalid configuration or arguments.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Catalog entry or script content unreadable.
    #[error("Resource error: {message}")]
    Resource {
        /// What could not be read.
        message: String,
        /// Underlying I/O failure, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// A script failed while running.
    #[error("Error running script '{script}'. Cause: {source}")]
    ScriptRuntime {
        /// Name of the failing script.
        script: String,
        /// The runner failure.
        #[source]
        source: ScriptError,
    },

    /// The abort script of a failed change failed as well.
    #[error("Abort script '{script}' failed after: {original}. Cause: {source}")]
    AbortFailed {
        /// Name of the abort script.
        script: String,
        /// The failure raised by the abort script.
        #[source]
        source: ScriptError,
        /// The failure that triggered the abort script.
        original: Box<MigrationError>,
    },

    /// Changelog read/write or connection failure.
    #[error("Changelog error: {message}. Cause: {source}")]
    Persistence {
        /// What was being done.
        message: String,
        /// The database failure.
        #[source]
        source: DatabaseError,
    },
}

impl MigrationError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a resource error without an underlying I/O cause.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a resource error from an I/O failure.
    pub fn io(msg: impl Into<String>, source: std::io::Error) -> Self {
        Self::Resource {
            message: msg.into(),
            source: Some(source),
        }
    }

    /// Create a persistence error.
    pub fn persistence(msg: impl Into<String>, source: DatabaseError) -> Self {
        Self::Persistence {
            message: msg.into(),
            source,
        }
    }

    /// Wrap a runner failure for the named script.
    ///
    /// Read failures are resource errors; everything else is a script runtime error.
    pub fn script(script: impl Into<String>, source: ScriptError) -> Self {
        let script = script.into();
        match source {
            ScriptError::Read(err) => Self::io(format!("unable to read script '{}'", script), err),
            source => Self::ScriptRuntime { script, source },
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Resource { .. } => ErrorKind::Resource,
            Self::ScriptRuntime { .. } | Self::AbortFailed { .. } => ErrorKind::ScriptRuntime,
            Self::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// Check whether this failure is eligible for abort-script handling.
    pub fn is_script_runtime(&self) -> bool {
        matches!(self, Self::ScriptRuntime { .. })
    }
}

impl From<toml::de::Error> for MigrationError {
    fn from(err: toml::de::Error) -> Self {
        MigrationError::Configuration(format!("Failed to parse TOML: {}", err))
    }
}
