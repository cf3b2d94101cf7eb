//! Project configuration, loaded from TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::hook::HookSettings;
use crate::options::DatabaseOperationOption;

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "shale.toml";

/// Full configuration of a migrations project.
///
/// ```toml
/// [database]
/// changelog_table = "CHANGELOG"
/// delimiter = ";"
///
/// [paths]
/// base = "."
///
/// [hooks]
/// before_up = ["SQL:create_audit.sql"]
///
/// [variables]
/// schema = "app"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Database operation options.
    pub database: DatabaseOperationOption,
    /// Project directories.
    pub paths: SelectedPaths,
    /// Hook script settings.
    pub hooks: HookSettings,
    /// Global variables handed to pluggable scripts.
    pub variables: BTreeMap<String, String>,
}

impl MigrationConfig {
    /// Load configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MigrationError::io(format!("unable to read {}", path.display()), e))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> MigrateResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Directories of a migrations project.
///
/// Relative `scripts` and `hooks` entries are resolved against `base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectedPaths {
    /// Project root.
    pub base: PathBuf,
    /// Migration scripts directory, defaults to `<base>/scripts`.
    pub scripts: Option<PathBuf>,
    /// Hook scripts directory, defaults to `<base>/hooks`.
    pub hooks: Option<PathBuf>,
}

impl Default for SelectedPaths {
    fn default() -> Self {
        Self {
            base: PathBuf::from("."),
            scripts: None,
            hooks: None,
        }
    }
}

impl SelectedPaths {
    /// Paths rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            ..Default::default()
        }
    }

    /// Resolved scripts directory.
    pub fn script_path(&self) -> PathBuf {
        self.resolve(self.scripts.as_deref(), "scripts")
    }

    /// Resolved hooks directory.
    pub fn hook_path(&self) -> PathBuf {
        self.resolve(self.hooks.as_deref(), "hooks")
    }

    fn resolve(&self, configured: Option<&Path>, default: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.base.join(path),
            None => self.base.join(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let paths = SelectedPaths::new("/srv/db");
        assert_eq!(paths.script_path(), PathBuf::from("/srv/db/scripts"));
        assert_eq!(paths.hook_path(), PathBuf::from("/srv/db/hooks"));
    }

    #[test]
    fn test_custom_paths() {
        let paths = SelectedPaths {
            base: PathBuf::from("/srv/db"),
            scripts: Some(PathBuf::from("sql")),
            hooks: Some(PathBuf::from("/etc/hooks")),
        };
        assert_eq!(paths.script_path(), PathBuf::from("/srv/db/sql"));
        assert_eq!(paths.hook_path(), PathBuf::from("/etc/hooks"));
    }

    #[test]
    fn test_config_from_toml() {
        let config = MigrationConfig::from_toml_str(
            r#"
            [database]
            changelog_table = "schema_changes"

            [paths]
            base = "db"

            [hooks]
            before_up = ["SQL:before.sql"]
            after_each_down = ["JS:notify.js:_function=notify"]

            [variables]
            owner = "app"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.changelog_table, "schema_changes");
        assert_eq!(config.paths.script_path(), PathBuf::from("db/scripts"));
        assert_eq!(config.hooks.before_up, vec!["SQL:before.sql".to_string()]);
        assert_eq!(config.hooks.after_each_down.len(), 1);
        assert_eq!(config.variables.get("owner").map(String::as_str), Some("app"));
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = MigrationConfig::from_toml_str("[database\n").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MigrationConfig::load("/definitely/not/here/shale.toml").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resource);
    }
}
