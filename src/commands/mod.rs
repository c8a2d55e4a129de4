//! Top-level subcommand orchestration.
pub mod build;
pub mod list;
pub mod package;
pub mod version;

use std::path::{Path, PathBuf};
use std::str::FromStr as _;

use anyhow::{Context as _, Result};

use crate::backend::PackagerKind;
use crate::cli::ConfigOpts;
use crate::config::Configuration;
use crate::config::toml_loader::{ConfigFile, PackagerSection};
use crate::context::ExecutionContext;
use crate::logging::STAGE_TARGET;

/// Shared state produced by the common command setup sequence.
///
/// Merges the configuration file with `-P` properties, picks the packager
/// type and resolves the output directory, so `build` and `package` do not
/// repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Selected packager.
    pub kind: PackagerKind,
    /// Context for the run.
    pub ctx: ExecutionContext,
    /// Input from the `[packager]` table, relative to the config file.
    pub input: Option<PathBuf>,
}

impl CommandSetup {
    /// Load configuration and resolve the packager type and output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, a property is
    /// malformed, or no known packager type is given.
    pub fn init(opts: &ConfigOpts) -> Result<Self> {
        tracing::info!(target: STAGE_TARGET, "Loading configuration");
        let mut builder = Configuration::builder();
        let mut section = PackagerSection::default();
        if let Some(path) = &opts.config {
            let path = canonical(path)?;
            let file = ConfigFile::load(&path)?;
            for (key, value) in file.flatten(&path)? {
                builder = builder.set(key, value);
            }
            section = relative_to(file.packager, path.parent());
            tracing::info!("config: {}", path.display());
        }
        for property in &opts.properties {
            builder = builder.property(property)?;
        }
        let config = builder.build();
        tracing::debug!("{} configuration values", config.len());

        let kind_name = opts
            .kind
            .as_deref()
            .or(section.kind.as_deref())
            .context("no packager type given; use --type or set `type` in [packager]")?;
        let kind = PackagerKind::from_str(kind_name)?;
        tracing::info!("packager: {kind}");

        let output = opts
            .output
            .clone()
            .or(section.output)
            .unwrap_or_else(|| PathBuf::from("."));
        let output = absolute(&output)?;
        tracing::debug!("output: {}", output.display());

        Ok(Self {
            kind,
            ctx: ExecutionContext::new(config, output),
            input: section.input,
        })
    }
}

/// Resolve `[packager]` paths against the directory holding the config file.
fn relative_to(mut section: PackagerSection, base: Option<&Path>) -> PackagerSection {
    if let Some(base) = base {
        section.input = section.input.map(|p| base.join(p));
        section.output = section.output.map(|p| base.join(p));
    }
    section
}

/// Canonical form of an existing user-supplied path.
pub(crate) fn canonical(path: &Path) -> Result<PathBuf> {
    dunce::canonicalize(path).with_context(|| format!("cannot access {}", path.display()))
}

/// Canonical form of `path` if it exists, otherwise its absolute form.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return canonical(path);
    }
    std::path::absolute(path).with_context(|| format!("invalid path {}", path.display()))
}
