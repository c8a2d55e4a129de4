//! Built-in text templates with user overrides.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use crate::config::options::OptionSpec;
use crate::context::ExecutionContext;

/// A named template whose built-in text can be replaced by a file named in
/// a configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    name: &'static str,
    override_option: OptionSpec,
    builtin: &'static str,
}

impl Template {
    /// Declare a template called `name` with built-in text `builtin`,
    /// overridable through `override_option`.
    #[must_use]
    pub const fn new(name: &'static str, override_option: OptionSpec, builtin: &'static str) -> Self {
        Self {
            name,
            override_option,
            builtin,
        }
    }

    /// File name used when saving the template.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Option whose value replaces the built-in text.
    #[must_use]
    pub const fn override_option(&self) -> &OptionSpec {
        &self.override_option
    }

    /// The built-in text.
    #[must_use]
    pub const fn builtin(&self) -> &'static str {
        self.builtin
    }

    /// Template text for this run: the override file if configured,
    /// otherwise the built-in text.
    ///
    /// # Errors
    ///
    /// Returns an error if the override file cannot be read.
    pub fn load(&self, ctx: &ExecutionContext) -> Result<String> {
        match ctx.path_value(&self.override_option) {
            Some(path) => {
                tracing::debug!("using {} from {}", self.name, path.display());
                std::fs::read_to_string(&path)
                    .with_context(|| format!("reading template {}", path.display()))
            }
            None => Ok(self.builtin.to_string()),
        }
    }
}

/// Write the built-in text of every template in `templates` into `dir`.
///
/// Existing files are never overwritten.
///
/// # Errors
///
/// Returns an error if `dir` cannot be created or a file already exists.
pub fn save_templates(templates: &[Template], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))?;
    templates
        .iter()
        .map(|template| {
            let path = dir.join(template.name());
            crate::fsutil::write_new(&path, template.builtin())?;
            Ok(path)
        })
        .collect()
}
