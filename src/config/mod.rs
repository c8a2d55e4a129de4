//! Key/value configuration consumed by the pipeline and backends.
//!
//! A [`Configuration`] is a flat map of dotted keys such as `package.name`.
//! Values come from a TOML file (see [`toml_loader`]) and from `key=value`
//! overrides on the command line, with overrides taking precedence.
pub mod options;
pub mod toml_loader;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use options::OptionSpec;
use toml_loader::ConfigFile;

/// Immutable set of configured values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    values: BTreeMap<String, String>,
}

impl Configuration {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Load every value from the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or flattened.
    pub fn load(path: &Path) -> Result<Self> {
        let file = ConfigFile::load(path)?;
        Ok(Self {
            values: file.flatten(path)?,
        })
    }

    /// Raw value for `key`. Blank values count as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Configured value of `option`, ignoring its default.
    #[must_use]
    pub fn value(&self, option: &OptionSpec) -> Option<&str> {
        self.get(option.key)
    }

    /// Configured value of `option`, or its default.
    #[must_use]
    pub fn value_or_default(&self, option: &OptionSpec) -> Option<&str> {
        self.value(option).or(option.default)
    }

    /// Iterate over every configured key and value in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of configured keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no keys are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builder for [`Configuration`]. Later values replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    values: BTreeMap<String, String>,
}

impl ConfigurationBuilder {
    /// Set `key` to `value`.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Set the value of `option`.
    #[must_use]
    pub fn option(self, option: &OptionSpec, value: impl Into<String>) -> Self {
        self.set(option.key, value)
    }

    /// Copy every value from `config`.
    #[must_use]
    pub fn merge(mut self, config: &Configuration) -> Self {
        for (k, v) in &config.values {
            self.values.insert(k.clone(), v.clone());
        }
        self
    }

    /// Apply a `key=value` property.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProperty`] when there is no `=` or the
    /// key is empty.
    pub fn property(self, property: &str) -> Result<Self, ConfigError> {
        let (key, value) = property
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ConfigError::InvalidProperty(property.to_string()))?;
        Ok(self.set(key, value))
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Configuration {
        Configuration {
            values: self.values,
        }
    }
}
