//! SQLite connection configuration.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{SqliteError, SqliteResult};

static MEMORY_DATABASES: AtomicU64 = AtomicU64::new(0);

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabasePath {
    /// Named in-memory database, shared by every connection of one provider.
    Memory(String),
    /// Database file.
    File(PathBuf),
}

impl DatabasePath {
    /// Whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    /// The string handed to SQLite when opening a connection.
    pub fn open_target(&self) -> String {
        match self {
            Self::Memory(name) => format!("file:{}?mode=memory&cache=shared", name),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Delete the rollback journal after each transaction.
    Delete,
    /// Truncate the rollback journal.
    Truncate,
    /// Keep the rollback journal, zeroing its header.
    Persist,
    /// Keep the rollback journal in memory.
    Memory,
    /// Write-ahead log.
    Wal,
    /// No journal.
    Off,
}

impl JournalMode {
    /// Value for `PRAGMA journal_mode`.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }

    fn parse(value: &str) -> SqliteResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "truncate" => Ok(Self::Truncate),
            "persist" => Ok(Self::Persist),
            "memory" => Ok(Self::Memory),
            "wal" => Ok(Self::Wal),
            "off" => Ok(Self::Off),
            other => Err(SqliteError::config(format!("unknown journal mode: {}", other))),
        }
    }
}

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Database location.
    pub path: DatabasePath,
    /// Enforce foreign keys.
    pub foreign_keys: bool,
    /// How long to wait on a locked database.
    pub busy_timeout: Option<Duration>,
    /// Journal mode, SQLite's default when unset.
    pub journal_mode: Option<JournalMode>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::memory()
    }
}

impl SqliteConfig {
    /// A fresh, uniquely named in-memory database.
    pub fn memory() -> Self {
        let n = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
        Self::memory_named(format!("shale-{}-{}", std::process::id(), n))
    }

    /// A named in-memory database.
    pub fn memory_named(name: impl Into<String>) -> Self {
        Self::with_path(DatabasePath::Memory(name.into()))
    }

    /// A database file.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::with_path(DatabasePath::File(path.as_ref().to_path_buf()))
    }

    fn with_path(path: DatabasePath) -> Self {
        Self {
            path,
            foreign_keys: true,
            busy_timeout: Some(Duration::from_secs(5)),
            journal_mode: None,
        }
    }

    /// Parse a SQLite URL.
    ///
    /// Supported formats:
    /// - `sqlite::memory:` or `:memory:`
    /// - `sqlite://path/to/db.sqlite`
    /// - `sqlite:path/to/db.sqlite` or `file:path/to/db.sqlite`
    /// - a bare file path
    ///
    /// Query parameters `foreign_keys`, `busy_timeout` (milliseconds) and
    /// `journal_mode` tune the connection.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url = url.as_ref();
        let (location, query) = match url.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url, None),
        };

        let path = location
            .strip_prefix("sqlite://")
            .or_else(|| location.strip_prefix("sqlite:"))
            .or_else(|| location.strip_prefix("file:"))
            .unwrap_or(location);

        let mut config = match path {
            ":memory:" => Self::memory(),
            "" => return Err(SqliteError::config("database path is required")),
            path => Self::file(path),
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "foreign_keys" => config.foreign_keys = value == "true" || value == "1",
                "busy_timeout" => {
                    let ms = value.parse().map_err(|_| {
                        SqliteError::config(format!("invalid busy_timeout: {}", value))
                    })?;
                    config.busy_timeout = Some(Duration::from_millis(ms));
                }
                "journal_mode" => config.journal_mode = Some(JournalMode::parse(value)?),
                _ => {}
            }
        }

        Ok(config)
    }

    /// Pragmas run on every new connection.
    pub fn pragmas(&self) -> Vec<String> {
        let mut pragmas = vec![format!(
            "PRAGMA foreign_keys = {}",
            if self.foreign_keys { "ON" } else { "OFF" }
        )];
        if let Some(mode) = self.journal_mode {
            pragmas.push(format!("PRAGMA journal_mode = {}", mode.as_pragma()));
        }
        pragmas
    }

    /// Set foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Set the journal mode.
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = Some(mode);
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_memory_databases_are_distinct() {
        let a = SqliteConfig::memory();
        let b = SqliteConfig::memory();
        assert!(a.path.is_memory());
        assert_ne!(a.path, b.path);
        assert!(a.path.open_target().ends_with("?mode=memory&cache=shared"));
    }

    #[test]
    fn test_from_url_file() {
        let config = SqliteConfig::from_url("sqlite://./data/app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("./data/app.db")));

        let config = SqliteConfig::from_url("sqlite:app.db").unwrap();
        assert_eq!(config.path.open_target(), "app.db");

        let config = SqliteConfig::from_url("file:app.db?foreign_keys=1").unwrap();
        assert_eq!(config.path.open_target(), "app.db");

        let config = SqliteConfig::from_url("/tmp/app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("/tmp/app.db")));
    }

    #[test]
    fn test_from_url_memory() {
        assert!(SqliteConfig::from_url("sqlite::memory:").unwrap().path.is_memory());
        assert!(SqliteConfig::from_url(":memory:").unwrap().path.is_memory());
    }

    #[test]
    fn test_from_url_options() {
        let config = SqliteConfig::from_url(
            "sqlite://app.db?foreign_keys=false&busy_timeout=250&journal_mode=wal",
        )
        .unwrap();
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.journal_mode, Some(JournalMode::Wal));
    }

    #[test]
    fn test_from_url_rejects_bad_values() {
        assert!(SqliteConfig::from_url("sqlite://").is_err());
        assert!(SqliteConfig::from_url("sqlite://a.db?journal_mode=fast").is_err());
        assert!(SqliteConfig::from_url("sqlite://a.db?busy_timeout=soon").is_err());
    }

    #[test]
    fn test_pragmas() {
        assert_eq!(SqliteConfig::file("a.db").pragmas(), vec!["PRAGMA foreign_keys = ON"]);

        let pragmas = SqliteConfig::file("a.db")
            .foreign_keys(false)
            .journal_mode(JournalMode::Truncate)
            .pragmas();
        assert_eq!(
            pragmas,
            vec!["PRAGMA foreign_keys = OFF", "PRAGMA journal_mode = TRUNCATE"]
        );
    }
}
