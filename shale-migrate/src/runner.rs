//! Script content and the runners that execute it.

use std::fmt;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::{debug, trace, warn};

use crate::connection::Connection;
use crate::error::ScriptError;
use crate::options::DatabaseOperationOption;

/// Matches `-- @DELIMITER $$` and `// @DELIMITER GO` style directives.
static DELIMITER_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*((--)|(//))?\s*(//)?\s*@DELIMITER\s+([^\s]+)")
        .expect("delimiter directive pattern is valid")
});

/// Named script content.
///
/// The reader is consumed when the script runs and released when the script
/// is dropped.
pub struct Script {
    name: String,
    reader: Box<dyn Read>,
}

impl Script {
    /// Create a script from any reader.
    pub fn new(name: impl Into<String>, reader: impl Read + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    /// Create a script from in-memory text.
    pub fn from_string(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(name, Cursor::new(content.into().into_bytes()))
    }

    /// Name of the script, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the whole script.
    pub fn into_string(mut self) -> std::io::Result<String> {
        let mut content = String::new();
        self.reader.read_to_string(&mut content)?;
        Ok(content)
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script").field("name", &self.name).finish()
    }
}

/// Executes script content against a connection.
pub trait ScriptRunner {
    /// Run a script. With `stop_on_error` set, the first failing statement is
    /// returned as an error.
    fn run(
        &self,
        conn: &mut dyn Connection,
        script: Script,
        options: &DatabaseOperationOption,
    ) -> Result<(), ScriptError>;
}

impl<R: ScriptRunner + ?Sized> ScriptRunner for Box<R> {
    fn run(
        &self,
        conn: &mut dyn Connection,
        script: Script,
        options: &DatabaseOperationOption,
    ) -> Result<(), ScriptError> {
        (**self).run(conn, script, options)
    }
}

/// Line-oriented SQL script runner.
///
/// Lines starting with `--` or `//` are comments. A statement ends on the first
/// line containing the delimiter, or, with `full_line_delimiter`, on a line that
/// consists of the delimiter alone. A `-- @DELIMITER x` comment switches the
/// delimiter for the rest of the script.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlScriptRunner;

impl SqlScriptRunner {
    /// Create a runner.
    pub fn new() -> Self {
        Self
    }

    fn execute_full_script(
        &self,
        conn: &mut dyn Connection,
        content: &str,
        options: &DatabaseOperationOption,
    ) -> Result<(), ScriptError> {
        debug!(len = content.len(), "Executing full script");
        match conn.execute_batch(content) {
            Ok(()) => self.check_warnings(conn, content, options),
            Err(source) if options.stop_on_error => Err(ScriptError::Statement {
                statement: content.to_string(),
                source,
            }),
            Err(source) => {
                warn!(error = %source, "Error executing script, continuing");
                Ok(())
            }
        }
    }

    fn execute_line_by_line(
        &self,
        conn: &mut dyn Connection,
        content: &str,
        options: &DatabaseOperationOption,
    ) -> Result<(), ScriptError> {
        let mut delimiter = options.delimiter.clone();
        let mut command = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if is_comment(trimmed) {
                if let Some(caps) = DELIMITER_DIRECTIVE.captures(trimmed) {
                    if let Some(new_delimiter) = caps.get(5) {
                        delimiter = new_delimiter.as_str().to_string();
                        trace!(delimiter = %delimiter, "Delimiter changed");
                    }
                }
                trace!(comment = %trimmed, "Skipping comment");
            } else if is_command_end(trimmed, &delimiter, options.full_line_delimiter) {
                let end = line.rfind(delimiter.as_str()).unwrap_or(line.len());
                command.push_str(&line[..end]);
                command.push('\n');
                self.execute_statement(conn, &command, options)?;
                command.clear();
            } else if !trimmed.is_empty() {
                command.push_str(line);
                command.push('\n');
            }
        }

        if !command.trim().is_empty() {
            return Err(ScriptError::Unterminated {
                statement: command,
                delimiter,
            });
        }

        Ok(())
    }

    fn execute_statement(
        &self,
        conn: &mut dyn Connection,
        statement: &str,
        options: &DatabaseOperationOption,
    ) -> Result<(), ScriptError> {
        let statement = statement.trim();
        if statement.is_empty() {
            return Ok(());
        }

        debug!(sql = %statement, "Executing statement");
        match conn.execute_statement(statement) {
            Ok(()) => self.check_warnings(conn, statement, options),
            Err(source) if options.stop_on_error => Err(ScriptError::Statement {
                statement: statement.to_string(),
                source,
            }),
            Err(source) => {
                warn!(sql = %statement, error = %source, "Error executing statement, continuing");
                Ok(())
            }
        }
    }

    fn check_warnings(
        &self,
        conn: &mut dyn Connection,
        statement: &str,
        options: &DatabaseOperationOption,
    ) -> Result<(), ScriptError> {
        for warning in conn.take_warnings() {
            if options.throw_warning {
                return Err(ScriptError::Warning {
                    statement: statement.to_string(),
                    warning,
                });
            }
            warn!(sql = %statement, warning = %warning, "Statement produced a warning");
        }
        Ok(())
    }
}

impl ScriptRunner for SqlScriptRunner {
    fn run(
        &self,
        conn: &mut dyn Connection,
        script: Script,
        options: &DatabaseOperationOption,
    ) -> Result<(), ScriptError> {
        let name = script.name().to_string();
        let mut content = script.into_string()?;
        if options.remove_crs {
            content = content.replace("\r\n", "\n");
        }

        conn.set_auto_commit(options.auto_commit)
            .map_err(ScriptError::Transaction)?;

        let result = if options.send_full_script {
            self.execute_full_script(conn, &content, options)
        } else {
            self.execute_line_by_line(conn, &content, options)
        };

        if options.auto_commit {
            return result;
        }

        match result {
            Ok(()) => conn.commit().map_err(ScriptError::Transaction),
            Err(err) => {
                if let Err(rollback) = conn.rollback() {
                    warn!(script = %name, error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with("--") || trimmed.starts_with("//")
}

fn is_command_end(trimmed: &str, delimiter: &str, full_line_delimiter: bool) -> bool {
    if full_line_delimiter {
        trimmed == delimiter
    } else {
        trimmed.contains(delimiter)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::connection::{DatabaseError, Row, SqlValue};

    /// Connection that records what it is asked to do.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingConnection {
        pub statements: Vec<String>,
        pub batches: Vec<String>,
        pub commits: usize,
        pub rollbacks: usize,
        pub auto_commit: Option<bool>,
        pub fail_on: Option<String>,
        pub warnings: Vec<String>,
    }

    impl Connection for RecordingConnection {
        fn execute(&mut self, sql: &str, _params: &[SqlValue]) -> Result<usize, DatabaseError> {
            self.statements.push(sql.to_string());
            Ok(1)
        }

        fn query(&mut self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>, DatabaseError> {
            Ok(Vec::new())
        }

        fn execute_statement(&mut self, sql: &str) -> Result<(), DatabaseError> {
            if let Some(fail) = &self.fail_on {
                if sql.contains(fail.as_str()) {
                    return Err(DatabaseError::new(format!("syntax error near {}", fail)));
                }
            }
            self.statements.push(sql.to_string());
            Ok(())
        }

        fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError> {
            self.batches.push(sql.to_string());
            Ok(())
        }

        fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DatabaseError> {
            self.auto_commit = Some(auto_commit);
            Ok(())
        }

        fn commit(&mut self) -> Result<(), DatabaseError> {
            self.commits += 1;
            Ok(())
        }

        fn rollback(&mut self) -> Result<(), DatabaseError> {
            self.rollbacks += 1;
            Ok(())
        }

        fn take_warnings(&mut self) -> Vec<String> {
            std::mem::take(&mut self.warnings)
        }
    }

    fn run(conn: &mut RecordingConnection, sql: &str, options: &DatabaseOperationOption) -> Result<(), ScriptError> {
        SqlScriptRunner::new().run(conn, Script::from_string("test.sql", sql), options)
    }

    #[test]
    fn test_splits_on_delimiter() {
        let mut conn = RecordingConnection::default();
        let sql = "-- // create tables\nCREATE TABLE a (id INT);\nCREATE TABLE b (\n  id INT\n);\n";
        run(&mut conn, sql, &DatabaseOperationOption::default()).unwrap();

        assert_eq!(
            conn.statements,
            vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (\n  id INT\n)"]
        );
        assert_eq!(conn.auto_commit, Some(false));
        assert_eq!(conn.commits, 1);
        assert_eq!(conn.rollbacks, 0);
    }

    #[test]
    fn test_full_line_delimiter() {
        let mut conn = RecordingConnection::default();
        let options = DatabaseOperationOption::default()
            .delimiter("GO")
            .full_line_delimiter(true);
        run(&mut conn, "INSERT INTO t VALUES ('GOAL')\nGO\nSELECT 1\n  GO  \n", &options).unwrap();

        assert_eq!(conn.statements, vec!["INSERT INTO t VALUES ('GOAL')", "SELECT 1"]);
    }

    #[test]
    fn test_delimiter_directive() {
        let mut conn = RecordingConnection::default();
        let sql = "-- @DELIMITER $$\nCREATE TRIGGER t BEGIN SELECT 1; END$$\n-- @DELIMITER ;\nSELECT 2;\n";
        run(&mut conn, sql, &DatabaseOperationOption::default()).unwrap();

        assert_eq!(
            conn.statements,
            vec!["CREATE TRIGGER t BEGIN SELECT 1; END", "SELECT 2"]
        );
    }

    #[test]
    fn test_unterminated_statement() {
        let mut conn = RecordingConnection::default();
        let err = run(&mut conn, "SELECT 1;\nSELECT 2\n", &DatabaseOperationOption::default())
            .unwrap_err();

        assert!(matches!(err, ScriptError::Unterminated { .. }));
        assert_eq!(conn.rollbacks, 1);
        assert_eq!(conn.commits, 0);
    }

    #[test]
    fn test_stop_on_error() {
        let mut conn = RecordingConnection {
            fail_on: Some("BROKEN".to_string()),
            ..Default::default()
        };
        let err = run(&mut conn, "SELECT 1;\nBROKEN;\nSELECT 3;\n", &DatabaseOperationOption::default())
            .unwrap_err();

        assert!(matches!(err, ScriptError::Statement { .. }));
        assert_eq!(conn.statements, vec!["SELECT 1"]);
        assert_eq!(conn.rollbacks, 1);
    }

    #[test]
    fn test_continue_on_error() {
        let mut conn = RecordingConnection {
            fail_on: Some("BROKEN".to_string()),
            ..Default::default()
        };
        let options = DatabaseOperationOption::default().stop_on_error(false);
        run(&mut conn, "SELECT 1;\nBROKEN;\nSELECT 3;\n", &options).unwrap();

        assert_eq!(conn.statements, vec!["SELECT 1", "SELECT 3"]);
        assert_eq!(conn.commits, 1);
    }

    #[test]
    fn test_send_full_script() {
        let mut conn = RecordingConnection::default();
        let options = DatabaseOperationOption::default()
            .send_full_script(true)
            .remove_crs(true)
            .auto_commit(true);
        run(&mut conn, "SELECT 1;\r\nSELECT 2;\r\n", &options).unwrap();

        assert_eq!(conn.batches, vec!["SELECT 1;\nSELECT 2;\n"]);
        assert!(conn.statements.is_empty());
        assert_eq!(conn.commits, 0);
    }

    #[test]
    fn test_warnings() {
        let mut conn = RecordingConnection {
            warnings: vec!["truncated".to_string()],
            ..Default::default()
        };
        let err = run(&mut conn, "SELECT 1;\n", &DatabaseOperationOption::default()).unwrap_err();
        assert!(matches!(err, ScriptError::Warning { .. }));

        let mut conn = RecordingConnection {
            warnings: vec!["truncated".to_string()],
            ..Default::default()
        };
        let options = DatabaseOperationOption::default().throw_warning(false);
        run(&mut conn, "SELECT 1;\n", &options).unwrap();
    }

    #[test]
    fn test_script_debug_hides_reader() {
        let script = Script::from_string("init.sql", "SELECT 1;");
        assert_eq!(format!("{:?}", script), "Script { name: \"init.sql\" }");
        assert_eq!(script.into_string().unwrap(), "SELECT 1;");
    }
}
