//! Per-run execution context shared by the pipeline and backends.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::config::Configuration;
use crate::config::options::OptionSpec;
use crate::error::PackagerError;
use crate::exec::{ExecResult, Executor, SystemExecutor};
use crate::tokens::{self, TokenResolver};

/// Shared state for one packaging run.
pub struct ExecutionContext {
    /// Resolved configuration values.
    pub config: Configuration,
    /// Directory that receives images and packages.
    pub destination: PathBuf,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("config", &self.config)
            .field("destination", &self.destination)
            .field("executor", &"<dyn Executor>")
            .finish()
    }
}

impl ExecutionContext {
    /// Creates a context that runs real system commands.
    #[must_use]
    pub fn new(config: Configuration, destination: impl Into<PathBuf>) -> Self {
        Self::with_executor(config, destination, Arc::new(SystemExecutor))
    }

    /// Creates a context with a custom executor.
    #[must_use]
    pub fn with_executor(
        config: Configuration,
        destination: impl Into<PathBuf>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            config,
            destination: destination.into(),
            executor,
        }
    }

    /// Output directory.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Configured value of `option`, ignoring its default.
    #[must_use]
    pub fn value(&self, option: &OptionSpec) -> Option<&str> {
        self.config.value(option)
    }

    /// Configured value of `option`, or its default.
    #[must_use]
    pub fn value_or_default(&self, option: &OptionSpec) -> Option<&str> {
        self.config.value_or_default(option)
    }

    /// Configured value of `option` as an absolute path.
    ///
    /// Relative values resolve against the current directory.
    #[must_use]
    pub fn path_value(&self, option: &OptionSpec) -> Option<PathBuf> {
        self.value(option).map(|v| {
            let path = PathBuf::from(v);
            std::path::absolute(&path).unwrap_or(path)
        })
    }

    /// Value of `option`, falling back to its default.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingValue`] if neither is set.
    pub fn require(&self, option: &OptionSpec) -> Result<&str, PackagerError> {
        self.value_or_default(option)
            .ok_or_else(|| PackagerError::MissingValue(option.key.to_string()))
    }

    /// Replacement text for a template token named after an option key.
    ///
    /// Returns the configured value, else the default of any registered
    /// option with that key.
    #[must_use]
    pub fn token_replacement_for(&self, key: &str) -> Option<String> {
        if let Some(v) = self.config.get(key) {
            return Some(v.to_string());
        }
        crate::backend::all_options()
            .into_iter()
            .find(|o| o.key == key)
            .and_then(|o| o.default)
            .map(str::to_string)
    }

    /// Substitute `${key}` tokens in `template` from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnresolvedToken`] for unknown keys.
    pub fn replace_tokens(&self, template: &str) -> Result<String, PackagerError> {
        tokens::substitute(template, self)
    }

    /// Whether `program` is on `PATH`.
    #[must_use]
    pub fn has_tool(&self, program: &str) -> bool {
        self.executor.which(program)
    }

    /// Run `program`, failing on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started, or
    /// [`PackagerError::ToolFailed`] if it exits unsuccessfully.
    pub fn exec(&self, program: &str, args: &[String]) -> Result<ExecResult> {
        let result = self.executor.run(program, args)?;
        check(program, result)
    }

    /// Run `program` inside `dir`, failing on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started, or
    /// [`PackagerError::ToolFailed`] if it exits unsuccessfully.
    pub fn exec_in(&self, dir: &Path, program: &str, args: &[String]) -> Result<ExecResult> {
        let result = self.executor.run_in(dir, program, args)?;
        check(program, result)
    }
}

fn check(program: &str, result: ExecResult) -> Result<ExecResult> {
    if result.success {
        return Ok(result);
    }
    for line in result.stderr.lines() {
        tracing::error!("{program}: {line}");
    }
    Err(PackagerError::ToolFailed {
        tool: program.to_string(),
        code: result.code,
    }
    .into())
}

impl TokenResolver for ExecutionContext {
    fn resolve(&self, key: &str) -> Option<String> {
        self.token_replacement_for(key)
    }
}
