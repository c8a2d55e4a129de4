//! External tool invocation.
use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
}

impl ExecResult {
    /// A successful result with no output.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            ..Self::default()
        }
    }

    /// A failed result with the given exit code and no output.
    #[must_use]
    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
            ..Self::default()
        }
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Runs external programs on behalf of the packaging backends.
///
/// A non-zero exit is reported through [`ExecResult`], not as an error;
/// `Err` means the program could not be started at all.
#[cfg_attr(test, mockall::automock)]
pub trait Executor {
    /// Run `program` with `args` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn run(&self, program: &str, args: &[String]) -> Result<ExecResult>;

    /// Run `program` with `args` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn run_in(&self, dir: &Path, program: &str, args: &[String]) -> Result<ExecResult>;

    /// Whether `program` can be found on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

/// Execute a prepared command, capturing its output.
fn execute(mut cmd: Command, label: &str) -> Result<ExecResult> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute: {label}"))?;
    let result = ExecResult::from(output);
    for line in result.stdout.lines() {
        tracing::debug!("{label}: {line}");
    }
    Ok(result)
}

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<ExecResult> {
        tracing::debug!("running {program} {}", args.join(" "));
        let mut cmd = Command::new(program);
        cmd.args(args);
        execute(cmd, program)
    }

    fn run_in(&self, dir: &Path, program: &str, args: &[String]) -> Result<ExecResult> {
        tracing::debug!("running {program} {} in {}", args.join(" "), dir.display());
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(dir);
        execute(cmd, program)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
