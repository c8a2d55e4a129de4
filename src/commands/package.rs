//! Command: build a package from an existing image.
use anyhow::Result;

use super::{CommandSetup, canonical};
use crate::cli::PackageOpts;
use crate::error::PackagerError;
use crate::pipeline::Pipeline;

/// Run the `package` subcommand.
///
/// # Errors
///
/// Returns an error if the image is not a directory, a requirement is not
/// met, or the packaging tool fails.
pub fn run(opts: &PackageOpts) -> Result<()> {
    let setup = CommandSetup::init(&opts.config)?;
    let image = canonical(&opts.image)?;
    if !image.is_dir() {
        return Err(PackagerError::InvalidInput(image).into());
    }

    let backend = setup.kind.backend(&setup.ctx)?;
    let pipeline = Pipeline::new(&setup.ctx, backend.as_ref());
    pipeline.validate_create_package()?;
    pipeline.create_package(&image)?;
    Ok(())
}
