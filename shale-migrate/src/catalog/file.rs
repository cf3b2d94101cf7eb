//! Scripts-directory catalog.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::Utc;
use regex_lite::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::change::Change;
use crate::error::{MigrateResult, MigrationError};
use crate::runner::Script;

/// File holding the bootstrap script.
pub const BOOTSTRAP_FILE: &str = "bootstrap.sql";

/// File holding the abort script.
pub const ONABORT_FILE: &str = "onabort.sql";

/// Marker line separating the apply part of a change file from its undo part.
pub const UNDO_MARKER: &str = "-- //@UNDO";

static UNDO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*--\s*//\s*@UNDO").expect("undo marker pattern is valid")
});

/// Catalog backed by a scripts directory.
///
/// ```text
/// scripts/
/// ├── bootstrap.sql
/// ├── onabort.sql
/// ├── 20240101120000_create_changelog.sql
/// └── 20240102090000_create_users.sql
/// ```
///
/// Each change file holds the apply script, then an [`UNDO_MARKER`] line, then the
/// rollback script.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    scripts_dir: PathBuf,
}

impl FileCatalog {
    /// Create a catalog over a scripts directory.
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
        }
    }

    /// The scripts directory.
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Write a new change file from the default template and return its path.
    pub fn create_change(&self, description: &str) -> MigrateResult<PathBuf> {
        std::fs::create_dir_all(&self.scripts_dir).map_err(|e| {
            MigrationError::io(
                format!("unable to create {}", self.scripts_dir.display()),
                e,
            )
        })?;

        let id = generate_id();
        let file_name = if description.trim().is_empty() {
            format!("{}.sql", id)
        } else {
            format!("{}_{}.sql", id, description.trim().replace(' ', "_"))
        };
        let path = self.scripts_dir.join(&file_name);

        let content = format!(
            "-- // {}\n-- Migration SQL that makes the change goes here.\n\n\n\n{}\n-- SQL to undo the change goes here.\n",
            description.trim(),
            UNDO_MARKER
        );
        std::fs::write(&path, content)
            .map_err(|e| MigrationError::io(format!("unable to write {}", path.display()), e))?;

        info!("Created change file: {}", file_name);
        Ok(path)
    }

    fn read(&self, path: &Path) -> MigrateResult<String> {
        std::fs::read_to_string(path)
            .map_err(|e| MigrationError::io(format!("unable to read {}", path.display()), e))
    }

    fn change_path(&self, change: &Change) -> MigrateResult<PathBuf> {
        let filename = change.filename.as_deref().ok_or_else(|| {
            MigrationError::resource(format!("change {} has no script file", change.id))
        })?;
        Ok(self.scripts_dir.join(filename))
    }

    fn optional_script(&self, file: &str) -> MigrateResult<Option<Script>> {
        let path = self.scripts_dir.join(file);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(Script::from_string(file, self.read(&path)?)))
    }
}

impl Catalog for FileCatalog {
    fn list_changes(&self) -> MigrateResult<Vec<Change>> {
        let entries = std::fs::read_dir(&self.scripts_dir).map_err(|e| {
            MigrationError::io(
                format!("unable to list {}", self.scripts_dir.display()),
                e,
            )
        })?;

        let mut changes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                MigrationError::io(
                    format!("unable to list {}", self.scripts_dir.display()),
                    e,
                )
            })?;
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || !is_change_file(file_name) {
                continue;
            }
            changes.push(parse_change_file_name(file_name)?);
        }

        changes.sort();
        debug!("Loaded {} changes from {}", changes.len(), self.scripts_dir.display());
        Ok(changes)
    }

    fn script_for(&self, change: &Change) -> MigrateResult<Script> {
        let (up, _) = split_undo(&self.read(&self.change_path(change)?)?);
        Ok(Script::from_string(change.display_name(), up))
    }

    fn rollback_script_for(&self, change: &Change) -> MigrateResult<Script> {
        let (_, down) = split_undo(&self.read(&self.change_path(change)?)?);
        Ok(Script::from_string(change.display_name(), down))
    }

    fn abort_script_for(&self, _change: &Change) -> MigrateResult<Option<Script>> {
        self.optional_script(ONABORT_FILE)
    }

    fn bootstrap_scripts(&self) -> MigrateResult<Vec<Script>> {
        Ok(self.optional_script(BOOTSTRAP_FILE)?.into_iter().collect())
    }
}

/// Generate a change id from the current time.
pub(crate) fn generate_id() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

fn is_change_file(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    lower.ends_with(".sql") && lower != BOOTSTRAP_FILE && lower != ONABORT_FILE
}

/// Parse `<id>_<description>.sql` or `<id>.sql` into a pending change.
fn parse_change_file_name(file_name: &str) -> MigrateResult<Change> {
    let stem = &file_name[..file_name.len() - ".sql".len()];
    let (id, description) = match stem.split_once('_') {
        Some((id, description)) => (id, description.replace('_', " ")),
        None => (stem, String::new()),
    };

    let id = Decimal::from_str(id).map_err(|_| {
        MigrationError::resource(format!(
            "Error parsing change id from file name '{}'",
            file_name
        ))
    })?;

    Ok(Change::new(id, description).with_filename(file_name))
}

/// Split change file content into its apply and undo parts.
fn split_undo(content: &str) -> (String, String) {
    let mut up = String::new();
    let mut down = String::new();
    let mut in_undo = false;

    for line in content.lines() {
        if !in_undo && UNDO_PATTERN.is_match(line) {
            in_undo = true;
            continue;
        }
        let target = if in_undo { &mut down } else { &mut up };
        target.push_str(line);
        target.push('\n');
    }

    (up, down)
}
