//! Registry of configuration keys shared by every packager.
//!
//! Backend-specific keys live next to each backend (see
//! [`crate::backend::PackagerKind::options`]).

/// A named configuration key with optional default value and help text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Dotted configuration key, e.g. `package.name`.
    pub key: &'static str,
    /// Value used when the key is not configured.
    pub default: Option<&'static str>,
    /// One-line description shown by `options`.
    pub help: &'static str,
}

impl OptionSpec {
    /// An option with no default value.
    #[must_use]
    pub const fn new(key: &'static str, help: &'static str) -> Self {
        Self {
            key,
            default: None,
            help,
        }
    }

    /// An option that falls back to `default` when unset.
    #[must_use]
    pub const fn with_default(key: &'static str, default: &'static str, help: &'static str) -> Self {
        Self {
            key,
            default: Some(default),
            help,
        }
    }
}

/// Application name. Required.
pub const PACKAGE_NAME: OptionSpec = OptionSpec::new("package.name", "Name of the application");

/// Application version.
pub const PACKAGE_VERSION: OptionSpec =
    OptionSpec::with_default("package.version", "1.0", "Version of the application");

/// Free-text description.
pub const PACKAGE_DESCRIPTION: OptionSpec = OptionSpec::with_default(
    "package.description",
    "",
    "Short description of the application",
);

/// Publisher or vendor name.
pub const PACKAGE_PUBLISHER: OptionSpec =
    OptionSpec::new("package.publisher", "Publisher or vendor of the application");

/// Project home page.
pub const PACKAGE_URL: OptionSpec = OptionSpec::new("package.url", "Home page of the application");

/// Runtime directory or archive to bundle.
pub const PACKAGE_RUNTIME: OptionSpec = OptionSpec::new(
    "package.runtime",
    "Path to a Java runtime directory or archive to bundle",
);

/// Directory or archive merged into the image after customization.
pub const PACKAGE_MERGE: OptionSpec = OptionSpec::new(
    "package.merge",
    "Directory or archive of files to merge into the image (__ROOT, __APP)",
);

/// Pattern of image paths to remove.
pub const PACKAGE_REMOVE: OptionSpec = OptionSpec::new(
    "package.remove",
    "Pattern of files to remove from the image, e.g. **/*.{dll,exe}",
);

/// Architecture label override.
pub const PACKAGE_ARCH: OptionSpec = OptionSpec::new(
    "package.arch",
    "Architecture label for the package, overriding detection from the runtime",
);

/// Options understood by every packager.
pub const GLOBAL_OPTIONS: &[OptionSpec] = &[
    PACKAGE_NAME,
    PACKAGE_VERSION,
    PACKAGE_DESCRIPTION,
    PACKAGE_PUBLISHER,
    PACKAGE_URL,
    PACKAGE_RUNTIME,
    PACKAGE_MERGE,
    PACKAGE_REMOVE,
    PACKAGE_ARCH,
];
