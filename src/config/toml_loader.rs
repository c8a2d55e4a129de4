//! TOML configuration file parsing.
use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Load and deserialize a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

/// Invocation defaults that a configuration file may provide in its
/// `[packager]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackagerSection {
    /// Packager type, e.g. `linux-deb`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Application directory or archive.
    pub input: Option<PathBuf>,
    /// Output directory.
    pub output: Option<PathBuf>,
}

/// A parsed configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Invocation defaults.
    #[serde(default)]
    pub packager: PackagerSection,
    /// Every other table, flattened later into dotted keys.
    #[serde(flatten)]
    pub properties: toml::Table,
}

impl ConfigFile {
    /// Load a configuration file from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        load_config(path)
    }

    /// Flatten nested tables into dotted keys.
    ///
    /// `[package] name = "x"` becomes `package.name = "x"`. Integers, floats,
    /// booleans and datetimes are converted with their TOML spelling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedValue`] for arrays.
    pub fn flatten(&self, file: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
        let mut out = BTreeMap::new();
        flatten_into("", &self.properties, file, &mut out)?;
        Ok(out)
    }
}

fn flatten_into(
    prefix: &str,
    table: &toml::Table,
    file: &Path,
    out: &mut BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let text = match value {
            toml::Value::Table(inner) => {
                flatten_into(&key, inner, file, out)?;
                continue;
            }
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Array(_) => {
                return Err(ConfigError::UnsupportedValue {
                    key,
                    file: file.display().to_string(),
                });
            }
        };
        out.insert(key, text);
    }
    Ok(())
}
