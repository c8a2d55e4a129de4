//! Installer backends and the helpers they share.
//!
//! Each [`PackagerKind`] names one installer format and knows its
//! configuration options, its templates, and how to construct the
//! [`Backend`] that drives the [`Pipeline`](crate::pipeline::Pipeline).
pub mod deb;
pub mod innosetup;
pub mod rpm;
pub mod tar_script;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context as _, Result};

use crate::arch::Architecture;
use crate::config::options::{self, OptionSpec};
use crate::context::ExecutionContext;
use crate::error::PackagerError;
use crate::pipeline::Backend;
use crate::templates::Template;

/// Built-in 48x48 PNG application icon.
pub const BUILTIN_PNG_ICON: &[u8] = include_bytes!("../../resources/icons/app-48x48.png");

/// Built-in scalable application icon.
pub const BUILTIN_SVG_ICON: &[u8] = include_bytes!("../../resources/icons/app.svg");

/// Built-in Windows application icon.
pub const BUILTIN_ICO_ICON: &[u8] = include_bytes!("../../resources/icons/app.ico");

/// The installer formats this tool can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackagerKind {
    /// Debian package built with `dpkg-deb`.
    Deb,
    /// RPM package built with `rpmbuild`.
    Rpm,
    /// Self-extracting shell script with an embedded tar archive.
    TarScript,
    /// Windows installer built with Inno Setup.
    InnoSetup,
}

impl PackagerKind {
    /// Every packager, in listing order.
    pub const ALL: [Self; 4] = [Self::Deb, Self::Rpm, Self::TarScript, Self::InnoSetup];

    /// Name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Deb => "linux-deb",
            Self::Rpm => "linux-rpm",
            Self::TarScript => "linux-tar-script",
            Self::InnoSetup => "windows-innosetup",
        }
    }

    /// One-line description shown by `types`.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Deb => "Linux DEB package (requires dpkg-deb)",
            Self::Rpm => "Linux RPM package (requires rpmbuild)",
            Self::TarScript => "Linux self-extracting shell installer",
            Self::InnoSetup => "Windows installer (requires Inno Setup)",
        }
    }

    /// Options specific to this packager.
    #[must_use]
    pub const fn options(self) -> &'static [OptionSpec] {
        match self {
            Self::Deb => deb::OPTIONS,
            Self::Rpm => rpm::OPTIONS,
            Self::TarScript => tar_script::OPTIONS,
            Self::InnoSetup => innosetup::OPTIONS,
        }
    }

    /// Templates this packager renders.
    #[must_use]
    pub const fn templates(self) -> &'static [Template] {
        match self {
            Self::Deb => deb::TEMPLATES,
            Self::Rpm => rpm::TEMPLATES,
            Self::TarScript => tar_script::TEMPLATES,
            Self::InnoSetup => innosetup::TEMPLATES,
        }
    }

    /// Construct the backend for one run.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration the backend derives its package
    /// name or version from is missing or invalid.
    pub fn backend(self, ctx: &ExecutionContext) -> Result<Box<dyn Backend>> {
        Ok(match self {
            Self::Deb => Box::new(deb::DebBackend::new(ctx)?),
            Self::Rpm => Box::new(rpm::RpmBackend::new(ctx)?),
            Self::TarScript => Box::new(tar_script::TarScriptBackend::new(ctx)),
            Self::InnoSetup => Box::new(innosetup::InnoSetupBackend::new()),
        })
    }
}

impl fmt::Display for PackagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PackagerKind {
    type Err = PackagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PackagerError::UnknownPackager(s.to_string()))
    }
}

/// Global options followed by every packager's options.
#[must_use]
pub fn all_options() -> Vec<OptionSpec> {
    options::GLOBAL_OPTIONS
        .iter()
        .chain(PackagerKind::ALL.iter().flat_map(|k| k.options()))
        .copied()
        .collect()
}

/// Lowercase `text` and replace anything outside `[a-z0-9+.-]` with `-`.
#[must_use]
pub fn sanitize_package_name(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Sanitized `package.name`, which must be at least two characters long and
/// start with a letter.
///
/// # Errors
///
/// Returns [`PackagerError::MissingValue`] or
/// [`PackagerError::InvalidValue`].
pub fn package_name(ctx: &ExecutionContext) -> Result<String, PackagerError> {
    let name = sanitize_package_name(ctx.require(&options::PACKAGE_NAME)?);
    let starts_with_letter = name.chars().next().is_some_and(char::is_alphabetic);
    if name.chars().count() < 2 || !starts_with_letter {
        return Err(PackagerError::InvalidValue {
            key: options::PACKAGE_NAME.key.to_string(),
            message: format!("`{name}` must be at least 2 characters and start with a letter"),
        });
    }
    Ok(name)
}

/// Architecture label for the package.
///
/// Uses `package.arch` when set. Otherwise the architecture is detected from
/// the runtime file name and converted with `label`. Without a runtime, or
/// when detection fails, `neutral` is returned; the latter also logs a
/// warning.
#[must_use]
pub fn package_arch(
    ctx: &ExecutionContext,
    label: fn(Architecture) -> &'static str,
    neutral: &'static str,
) -> String {
    if let Some(arch) = ctx.value(&options::PACKAGE_ARCH) {
        return arch.to_string();
    }
    let Some(runtime) = ctx.path_value(&options::PACKAGE_RUNTIME) else {
        return neutral.to_string();
    };
    if let Some(arch) = Architecture::detect_from_path(&runtime) {
        label(arch).to_string()
    } else {
        tracing::warn!(
            "cannot detect architecture of {}, using {neutral}; set {} to override",
            runtime.display(),
            options::PACKAGE_ARCH.key
        );
        neutral.to_string()
    }
}

/// First file in `bin_dir`, in sorted order, that is not a Windows `.exe`.
///
/// # Errors
///
/// Returns [`PackagerError::MissingLauncher`] if there is none.
pub fn find_launcher(bin_dir: &Path) -> Result<PathBuf> {
    crate::fsutil::sorted_entries(bin_dir)?
        .into_iter()
        .find(|p| {
            p.file_name()
                .is_some_and(|n| !n.to_string_lossy().ends_with(".exe"))
        })
        .ok_or_else(|| PackagerError::MissingLauncher(bin_dir.to_path_buf()).into())
}

/// File name of the launcher found by [`find_launcher`].
///
/// # Errors
///
/// Returns [`PackagerError::MissingLauncher`] if there is none.
pub fn launcher_name(bin_dir: &Path) -> Result<String> {
    let launcher = find_launcher(bin_dir)?;
    Ok(launcher
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default())
}

/// Options naming user icons.
#[derive(Debug, Clone, Copy)]
pub struct IconOptions {
    /// PNG icon path option.
    pub png: OptionSpec,
    /// SVG icon path option.
    pub svg: OptionSpec,
}

/// Install the application icons at `png_dest` and `svg_dest`.
///
/// A user PNG replaces the built-in icons. A user SVG is only used together
/// with a user PNG, and is otherwise ignored with a warning. When no PNG is
/// configured both built-in icons are installed.
///
/// # Errors
///
/// Returns an error if an icon cannot be copied or written.
pub fn install_icons(
    ctx: &ExecutionContext,
    icons: &IconOptions,
    png_dest: &Path,
    svg_dest: &Path,
) -> Result<()> {
    let png = ctx.path_value(&icons.png);
    let mut svg = ctx.path_value(&icons.svg);
    if svg.is_some() && png.is_none() {
        tracing::warn!(
            "{} is ignored without {}",
            icons.svg.key,
            icons.png.key
        );
        svg = None;
    }

    match &png {
        Some(path) => crate::fsutil::copy_file(path, png_dest)?,
        None => write_resource(png_dest, BUILTIN_PNG_ICON)?,
    }
    match (&svg, &png) {
        (Some(path), _) => crate::fsutil::copy_file(path, svg_dest)?,
        (None, None) => write_resource(svg_dest, BUILTIN_SVG_ICON)?,
        (None, Some(_)) => {}
    }
    Ok(())
}

/// Write built-in resource bytes to `dest`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_resource(dest: &Path, bytes: &[u8]) -> Result<()> {
    crate::fsutil::ensure_parent_dir(dest)?;
    fs::write(dest, bytes).with_context(|| format!("writing {}", dest.display()))
}

/// Render `template` with `tokens`, falling back to configuration values.
///
/// # Errors
///
/// Returns [`PackagerError::UnresolvedToken`] for unknown keys.
pub fn render(
    ctx: &ExecutionContext,
    template: &str,
    tokens: &[(&str, &str)],
) -> Result<String, PackagerError> {
    crate::tokens::substitute(
        template,
        &crate::tokens::Fallback {
            primary: tokens,
            secondary: ctx,
        },
    )
}
