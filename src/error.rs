//! Domain-specific error types for the packager.
//!
//! Leaf modules return [`PackagerError`] or [`ConfigError`] values, which the
//! pipeline and command layer wrap in [`anyhow::Error`] with additional
//! context. The typed value stays reachable through `downcast_ref`.
//!
//! # Error hierarchy
//!
//! ```text
//! PackagerError
//! ├── AmbiguousRoot      : zero or several application/runtime roots
//! ├── ImageExists        : image directory collision
//! ├── MissingRequirement : external tool or required option absent
//! ├── ToolFailed         : external tool exited non-zero
//! ├── InvalidInput / MissingValue / InvalidValue / UnresolvedToken / ...
//! └── Config(ConfigError) : configuration file and property parsing
//! ```

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The kind of tree searched for when locating a unique root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// An application tree, marked by `bin/*` and `etc/*.conf`.
    Application,
    /// A runtime tree, marked by `bin/java*`.
    Runtime,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => f.write_str("application"),
            Self::Runtime => f.write_str("runtime"),
        }
    }
}

/// Errors raised while building an image or a package.
#[derive(Error, Debug)]
pub enum PackagerError {
    /// The input did not contain exactly one application or runtime root.
    #[error("expected exactly one {kind} root in {}, found {found}", path.display())]
    AmbiguousRoot {
        /// Which marker set was searched for.
        kind: RootKind,
        /// The directory or archive that was searched.
        path: PathBuf,
        /// How many qualifying directories were found.
        found: usize,
    },

    /// The image directory already exists in the destination.
    #[error("image directory already exists: {}", .0.display())]
    ImageExists(PathBuf),

    /// A tool or setting needed to build the package is not available.
    #[error("missing requirement: {0}")]
    MissingRequirement(String),

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed ({})", exit_label(.code))]
    ToolFailed {
        /// Program name as invoked.
        tool: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
    },

    /// An input path is neither a directory nor a regular file.
    #[error("not a directory or regular file: {}", .0.display())]
    InvalidInput(PathBuf),

    /// A required configuration value is not set.
    #[error("required option `{0}` is not set")]
    MissingValue(String),

    /// A configuration value is present but unusable.
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue {
        /// Option key.
        key: String,
        /// What is wrong with the value.
        message: String,
    },

    /// A template referenced a token with no value.
    #[error("no value for template token ${{{0}}}")]
    UnresolvedToken(String),

    /// An archive could not be read or written.
    #[error("archive error in {}: {message}", path.display())]
    Archive {
        /// Path of the archive.
        path: PathBuf,
        /// Underlying codec message.
        message: String,
    },

    /// A file was not recognised as a zip or tar archive.
    #[error("unsupported archive format: {}", .0.display())]
    UnsupportedArchive(PathBuf),

    /// No launcher executable could be found in a `bin` directory.
    #[error("no launcher found in {}", .0.display())]
    MissingLauncher(PathBuf),

    /// The requested packager name is not known.
    #[error("unknown packager type '{0}'")]
    UnknownPackager(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(
        || "terminated by signal".to_string(),
        |c| format!("exit {c}"),
    )
}

/// Errors that arise from loading configuration files and properties.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A `key=value` property could not be parsed.
    #[error("invalid property '{0}': expected key=value")]
    InvalidProperty(String),

    /// A TOML value has a type that cannot be flattened to a string.
    #[error("unsupported value type for `{key}` in {file}")]
    UnsupportedValue {
        /// Dotted key of the offending value.
        key: String,
        /// File the value was read from.
        file: String,
    },

    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
