//! Hooks driven by script files.
//!
//! SQL hook scripts run through the operation's own runner and connection. Any
//! other language is handed to a [`ScriptEngine`] registered under its name.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::hook::{HookContext, MigrationHook};
use crate::runner::Script;

/// Language id of the built-in SQL hook scripts.
pub const SQL_LANGUAGE: &str = "SQL";

const KEY_FUNCTION: &str = "_function";
const KEY_OBJECT: &str = "_object";
const KEY_METHOD: &str = "_method";
const KEY_ARG: &str = "_arg";

/// A parsed hook entry, `<language>:<file>[:<key>=<value>...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookScriptSpec {
    /// Script language.
    pub language: String,
    /// Script file, relative to the hooks directory.
    pub file: String,
    /// Function to invoke after evaluating the script.
    pub function: Option<String>,
    /// Object whose `method` is invoked after evaluating the script.
    pub object: Option<String>,
    /// Method to invoke on `object`.
    pub method: Option<String>,
    /// Arguments for the function or method, in order.
    pub args: Vec<String>,
    /// Variables local to this script.
    pub local_vars: BTreeMap<String, String>,
}

impl HookScriptSpec {
    /// Parse a hook entry.
    pub fn parse(entry: &str) -> MigrateResult<Self> {
        let mut segments = entry.split(':');
        let language = segments.next().unwrap_or_default().trim();
        let file = segments.next().unwrap_or_default().trim();
        if language.is_empty() || file.is_empty() {
            return Err(MigrationError::configuration(format!(
                "Error creating a hook script. Hook setting must contain 'language' and 'file name' \
                 separated by ':' (e.g. SQL:post-up.sql): {}",
                entry
            )));
        }

        let mut spec = Self {
            language: language.to_string(),
            file: file.to_string(),
            ..Default::default()
        };

        for option in segments {
            let Some((key, value)) = option.split_once('=') else {
                continue;
            };
            let value = value.to_string();
            match key {
                KEY_FUNCTION => spec.function = Some(value),
                KEY_OBJECT => spec.object = Some(value),
                KEY_METHOD => spec.method = Some(value),
                KEY_ARG => spec.args.push(value),
                _ => {
                    spec.local_vars.insert(key.to_string(), value);
                }
            }
        }

        Ok(spec)
    }

    /// Whether this entry uses the built-in SQL language.
    pub fn is_sql(&self) -> bool {
        self.language.eq_ignore_ascii_case(SQL_LANGUAGE)
    }
}

/// A loaded script handed to a [`ScriptEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluggableScript {
    /// Script language.
    pub language: String,
    /// Script file name.
    pub name: String,
    /// Script source.
    pub source: String,
    /// Function to invoke after evaluation.
    pub function: Option<String>,
    /// Object whose method is invoked after evaluation.
    pub object: Option<String>,
    /// Method to invoke on the object.
    pub method: Option<String>,
    /// Invocation arguments.
    pub args: Vec<String>,
    /// Global variables overlaid with the script's local variables.
    pub variables: BTreeMap<String, String>,
}

/// Evaluates hook scripts of one language.
pub trait ScriptEngine: Send + Sync {
    /// Evaluate a script, then invoke its function or method if one is named.
    fn eval(&self, script: &PluggableScript, ctx: &mut HookContext<'_>) -> MigrateResult<()>;
}

/// Script engines keyed by language id (case-insensitive).
#[derive(Clone, Default)]
pub struct ScriptEngineRegistry {
    engines: HashMap<String, Arc<dyn ScriptEngine>>,
}

impl ScriptEngineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine for a language, replacing any previous one.
    pub fn register(mut self, language: &str, engine: impl ScriptEngine + 'static) -> Self {
        self.engines
            .insert(language.to_ascii_lowercase(), Arc::new(engine));
        self
    }

    /// Look up the engine of a language.
    pub fn get(&self, language: &str) -> Option<Arc<dyn ScriptEngine>> {
        self.engines.get(&language.to_ascii_lowercase()).cloned()
    }

    /// Whether a language has an engine.
    pub fn contains(&self, language: &str) -> bool {
        self.engines.contains_key(&language.to_ascii_lowercase())
    }
}

impl fmt::Debug for ScriptEngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut languages: Vec<_> = self.engines.keys().collect();
        languages.sort();
        f.debug_struct("ScriptEngineRegistry")
            .field("languages", &languages)
            .finish()
    }
}

enum HookScript {
    Sql {
        name: String,
        source: String,
    },
    Pluggable {
        engine: Arc<dyn ScriptEngine>,
        script: PluggableScript,
    },
}

impl HookScript {
    fn load(
        entry: &str,
        hook_dir: &Path,
        variables: &BTreeMap<String, String>,
        registry: &ScriptEngineRegistry,
    ) -> MigrateResult<Self> {
        let spec = HookScriptSpec::parse(entry)?;

        let engine = if spec.is_sql() {
            None
        } else {
            Some(registry.get(&spec.language).ok_or_else(|| {
                MigrationError::configuration(format!("Unsupported language: {}", spec.language))
            })?)
        };

        let path = hook_dir.join(&spec.file);
        let source = std::fs::read_to_string(&path).map_err(|e| {
            MigrationError::io(format!("Failed to read hook script file {}", path.display()), e)
        })?;
        debug!(hook = %entry, path = %path.display(), "Loaded hook script");

        Ok(match engine {
            None => Self::Sql {
                name: spec.file,
                source,
            },
            Some(engine) => {
                let mut merged = variables.clone();
                merged.extend(spec.local_vars);
                Self::Pluggable {
                    engine,
                    script: PluggableScript {
                        language: spec.language,
                        name: spec.file,
                        source,
                        function: spec.function,
                        object: spec.object,
                        method: spec.method,
                        args: spec.args,
                        variables: merged,
                    },
                }
            }
        })
    }

    fn run(&self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        match self {
            Self::Sql { name, source } => {
                info!("Applying SQL hook: {}", name);
                ctx.runner
                    .run(
                        &mut *ctx.conn,
                        Script::from_string(name.as_str(), source.as_str()),
                        ctx.options,
                    )
                    .map_err(|e| MigrationError::script(name.as_str(), e))
            }
            Self::Pluggable { engine, script } => {
                info!("Applying {} hook: {}", script.language, script.name);
                engine.eval(script, ctx)
            }
        }
    }
}

/// A [`MigrationHook`] running configured hook scripts.
#[derive(Default)]
pub struct ScriptedHook {
    before: Vec<HookScript>,
    before_each: Vec<HookScript>,
    after_each: Vec<HookScript>,
    after: Vec<HookScript>,
}

impl ScriptedHook {
    /// Build the hook for apply batches from `[hooks] *_up` entries.
    pub fn for_up(config: &MigrationConfig, registry: &ScriptEngineRegistry) -> MigrateResult<Self> {
        let hooks = &config.hooks;
        Self::build(
            [
                &hooks.before_up,
                &hooks.before_each_up,
                &hooks.after_each_up,
                &hooks.after_up,
            ],
            config,
            registry,
        )
    }

    /// Build the hook for revert batches from `[hooks] *_down` entries.
    pub fn for_down(
        config: &MigrationConfig,
        registry: &ScriptEngineRegistry,
    ) -> MigrateResult<Self> {
        let hooks = &config.hooks;
        Self::build(
            [
                &hooks.before_down,
                &hooks.before_each_down,
                &hooks.after_each_down,
                &hooks.after_down,
            ],
            config,
            registry,
        )
    }

    /// Whether no script is attached to any callback.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.before_each.is_empty()
            && self.after_each.is_empty()
            && self.after.is_empty()
    }

    fn build(
        entries: [&Vec<String>; 4],
        config: &MigrationConfig,
        registry: &ScriptEngineRegistry,
    ) -> MigrateResult<Self> {
        let hook_dir = config.paths.hook_path();
        let load = |list: &Vec<String>| {
            list.iter()
                .map(|entry| HookScript::load(entry, &hook_dir, &config.variables, registry))
                .collect::<MigrateResult<Vec<_>>>()
        };

        let [before, before_each, after_each, after] = entries;
        Ok(Self {
            before: load(before)?,
            before_each: load(before_each)?,
            after_each: load(after_each)?,
            after: load(after)?,
        })
    }

    fn run_all(scripts: &[HookScript], ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        scripts.iter().try_for_each(|script| script.run(ctx))
    }
}

impl fmt::Debug for ScriptedHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedHook")
            .field("before", &self.before.len())
            .field("before_each", &self.before_each.len())
            .field("after_each", &self.after_each.len())
            .field("after", &self.after.len())
            .finish()
    }
}

impl MigrationHook for ScriptedHook {
    fn before(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        Self::run_all(&self.before, ctx)
    }

    fn before_each(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        Self::run_all(&self.before_each, ctx)
    }

    fn after_each(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        Self::run_all(&self.after_each, ctx)
    }

    fn after(&mut self, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
        Self::run_all(&self.after, ctx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::SelectedPaths;
    use crate::error::ErrorKind;
    use crate::options::DatabaseOperationOption;
    use crate::runner::SqlScriptRunner;
    use crate::runner::tests::RecordingConnection;

    #[derive(Default)]
    struct CapturingEngine {
        seen: Arc<Mutex<Vec<(PluggableScript, Option<String>)>>>,
    }

    impl ScriptEngine for CapturingEngine {
        fn eval(&self, script: &PluggableScript, ctx: &mut HookContext<'_>) -> MigrateResult<()> {
            let change = ctx.change.as_ref().map(|c| c.id.to_string());
            self.seen
                .lock()
                .map_err(|_| MigrationError::configuration("poisoned"))?
                .push((script.clone(), change));
            Ok(())
        }
    }

    fn config_in(dir: &Path) -> MigrationConfig {
        MigrationConfig {
            paths: SelectedPaths {
                base: dir.to_path_buf(),
                scripts: None,
                hooks: Some(dir.to_path_buf()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_spec() {
        let spec = HookScriptSpec::parse(
            "JS:notify.js:_function=notify:_arg=a:_arg=b:channel=ops:ignored",
        )
        .unwrap();

        assert_eq!(spec.language, "JS");
        assert_eq!(spec.file, "notify.js");
        assert_eq!(spec.function.as_deref(), Some("notify"));
        assert_eq!(spec.args, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(spec.local_vars.get("channel").map(String::as_str), Some("ops"));
        assert!(!spec.is_sql());

        let spec = HookScriptSpec::parse("sql:post-up.sql").unwrap();
        assert!(spec.is_sql());
        assert_eq!(spec.object, None);
    }

    #[test]
    fn test_parse_spec_requires_file() {
        let err = HookScriptSpec::parse("SQL").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = HookScriptSpec::parse("SQL:").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_unknown_language() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hook.rb"), "puts 1").unwrap();
        let mut config = config_in(dir.path());
        config.hooks.before_up = vec!["ruby:hook.rb".to_string()];

        let err = ScriptedHook::for_up(&config, &ScriptEngineRegistry::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("Unsupported language: ruby"));
    }

    #[test]
    fn test_missing_hook_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.hooks.after_down = vec!["SQL:missing.sql".to_string()];

        let err = ScriptedHook::for_down(&config, &ScriptEngineRegistry::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);

        assert!(ScriptedHook::for_up(&config, &ScriptEngineRegistry::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_sql_hook_runs_on_context_connection() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("audit.sql"), "INSERT INTO audit VALUES (1);\n").unwrap();
        let mut config = config_in(dir.path());
        config.hooks.before_each_up = vec!["SQL:audit.sql".to_string()];

        let mut hook = ScriptedHook::for_up(&config, &ScriptEngineRegistry::new()).unwrap();

        let mut conn = RecordingConnection::default();
        let runner = SqlScriptRunner::new();
        let options = DatabaseOperationOption::default();
        let mut ctx = HookContext::new(&mut conn, &runner, &options, &[]);
        hook.before(&mut ctx).unwrap();
        hook.before_each(&mut ctx).unwrap();

        assert_eq!(conn.statements, vec!["INSERT INTO audit VALUES (1)"]);
    }

    #[test]
    fn test_pluggable_hook_gets_merged_variables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notify.js"), "function notify(x) {}").unwrap();
        let mut config = config_in(dir.path());
        config.hooks.after_each_up =
            vec!["JS:notify.js:_function=notify:_arg=done:owner=local".to_string()];
        config.variables.insert("owner".to_string(), "global".to_string());
        config.variables.insert("schema".to_string(), "app".to_string());

        let engine = CapturingEngine::default();
        let seen = Arc::clone(&engine.seen);
        let registry = ScriptEngineRegistry::new().register("js", engine);
        assert!(registry.contains("JS"));

        let mut hook = ScriptedHook::for_up(&config, &registry).unwrap();

        let mut conn = RecordingConnection::default();
        let runner = SqlScriptRunner::new();
        let options = DatabaseOperationOption::default();
        let change = crate::change::Change::new(rust_decimal::Decimal::from(7), "seven");
        let mut ctx = HookContext::new(&mut conn, &runner, &options, &[]).with_change(&change);
        hook.after_each(&mut ctx).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (script, change_id) = &seen[0];
        assert_eq!(change_id.as_deref(), Some("7"));
        assert_eq!(script.name, "notify.js");
        assert_eq!(script.source, "function notify(x) {}");
        assert_eq!(script.function.as_deref(), Some("notify"));
        assert_eq!(script.args, vec!["done".to_string()]);
        assert_eq!(script.variables.get("owner").map(String::as_str), Some("local"));
        assert_eq!(script.variables.get("schema").map(String::as_str), Some("app"));
    }
}
