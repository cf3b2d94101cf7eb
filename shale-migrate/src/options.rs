//! Options that shape how scripts and the changelog are handled.

use serde::{Deserialize, Serialize};

/// Default changelog table name.
pub const DEFAULT_CHANGELOG_TABLE: &str = "CHANGELOG";

/// Default statement delimiter.
pub const DEFAULT_DELIMITER: &str = ";";

/// Read-only options threaded through every database operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseOperationOption {
    /// Name of the changelog table.
    pub changelog_table: String,
    /// Statement delimiter.
    pub delimiter: String,
    /// Whether the delimiter must stand alone on its own line.
    pub full_line_delimiter: bool,
    /// Whether each statement is committed on its own.
    pub auto_commit: bool,
    /// Whether the first failing statement aborts the script.
    pub stop_on_error: bool,
    /// Whether database warnings are treated as errors.
    pub throw_warning: bool,
    /// Whether the whole script is sent as a single batch.
    pub send_full_script: bool,
    /// Whether carriage returns are stripped before execution.
    pub remove_crs: bool,
}

impl Default for DatabaseOperationOption {
    fn default() -> Self {
        Self {
            changelog_table: DEFAULT_CHANGELOG_TABLE.to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            full_line_delimiter: false,
            auto_commit: false,
            stop_on_error: true,
            throw_warning: true,
            send_full_script: false,
            remove_crs: false,
        }
    }
}

impl DatabaseOperationOption {
    /// Create options with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the changelog table name.
    pub fn changelog_table(mut self, table: impl Into<String>) -> Self {
        self.changelog_table = table.into();
        self
    }

    /// Set the statement delimiter.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Require the delimiter on its own line.
    pub fn full_line_delimiter(mut self, enabled: bool) -> Self {
        self.full_line_delimiter = enabled;
        self
    }

    /// Set autocommit.
    pub fn auto_commit(mut self, enabled: bool) -> Self {
        self.auto_commit = enabled;
        self
    }

    /// Set stop-on-error.
    pub fn stop_on_error(mut self, enabled: bool) -> Self {
        self.stop_on_error = enabled;
        self
    }

    /// Set throw-warning.
    pub fn throw_warning(mut self, enabled: bool) -> Self {
        self.throw_warning = enabled;
        self
    }

    /// Send scripts as a single batch.
    pub fn send_full_script(mut self, enabled: bool) -> Self {
        self.send_full_script = enabled;
        self
    }

    /// Strip carriage returns.
    pub fn remove_crs(mut self, enabled: bool) -> Self {
        self.remove_crs = enabled;
        self
    }

    /// The terminator appended to generated statements.
    pub fn statement_terminator(&self) -> String {
        if self.full_line_delimiter {
            format!("\n{}", self.delimiter)
        } else {
            self.delimiter.clone()
        }
    }
}
