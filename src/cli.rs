//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the installer image builder.
#[derive(Parser, Debug)]
#[command(
    name = "app-packager",
    about = "Build platform installers from an application directory and optional runtime",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Configuration sources shared by `build` and `package`.
#[derive(Parser, Debug, Clone, Default)]
pub struct ConfigOpts {
    /// Packager type (see `app-packager types`)
    #[arg(short = 't', long = "type")]
    pub kind: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Set a configuration value, overriding the file (repeatable)
    #[arg(short = 'P', long = "property", value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// Directory that receives the image and package [default: .]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an image from an application and build its package
    Build(BuildOpts),
    /// Build a package from an existing image
    Package(PackageOpts),
    /// List packager types
    Types,
    /// List configuration options
    Options(OptionsOpts),
    /// Write built-in templates for customization
    Templates(TemplatesOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::Package(_) => "package",
            Self::Types => "types",
            Self::Options(_) => "options",
            Self::Templates(_) => "templates",
            Self::Version => "version",
        }
    }
}

/// Options for the `build` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct BuildOpts {
    /// Configuration sources.
    #[command(flatten)]
    pub config: ConfigOpts,

    /// Application directory or archive (zip, tar, tar.gz)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Stop after the image is finalized
    #[arg(long)]
    pub image_only: bool,
}

/// Options for the `package` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct PackageOpts {
    /// Configuration sources.
    #[command(flatten)]
    pub config: ConfigOpts,

    /// Finalized image directory
    #[arg(long)]
    pub image: PathBuf,
}

/// Options for the `options` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct OptionsOpts {
    /// Only list options of this packager type
    #[arg(short = 't', long = "type")]
    pub kind: Option<String>,
}

/// Options for the `templates` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct TemplatesOpts {
    /// Packager type whose templates are written
    #[arg(short = 't', long = "type")]
    pub kind: String,

    /// Directory to write the templates into
    #[arg(short, long)]
    pub dir: PathBuf,
}
