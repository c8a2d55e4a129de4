//! Command: print version information.
use std::io::Write as _;

use anyhow::Result;

/// Version string baked in at build time.
#[must_use]
pub fn version() -> &'static str {
    option_env!("APP_PACKAGER_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the app-packager version to stdout.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub fn run() -> Result<()> {
    writeln!(std::io::stdout().lock(), "app-packager {}", version())?;
    Ok(())
}
