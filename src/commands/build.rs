//! Command: create an image and build its package.
use anyhow::{Context as _, Result};

use super::{CommandSetup, canonical};
use crate::cli::BuildOpts;
use crate::pipeline::Pipeline;

/// Run the `build` subcommand.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, a requirement is not
/// met, or any pipeline stage fails.
pub fn run(opts: &BuildOpts) -> Result<()> {
    let setup = CommandSetup::init(&opts.config)?;
    let input = opts
        .input
        .as_deref()
        .or(setup.input.as_deref())
        .context("no input given; use --input or set `input` in [packager]")?;
    let input = canonical(input)?;

    let backend = setup.kind.backend(&setup.ctx)?;
    let pipeline = Pipeline::new(&setup.ctx, backend.as_ref());
    pipeline.validate_create_image()?;
    if !opts.image_only {
        pipeline.validate_create_package()?;
    }

    let image = pipeline.create_image(&input)?;
    if opts.image_only {
        tracing::info!("image ready: {}", image.display());
        return Ok(());
    }
    pipeline.create_package(&image)?;
    Ok(())
}
