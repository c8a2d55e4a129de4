//! Self-extracting shell installer backend.
//!
//! The package is a POSIX shell script followed by a gzip-compressed tar of
//! the image. Running it unpacks `APPDIR` into the user's data directory and
//! writes a launcher and desktop entry. No external tools are needed to
//! build it.
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{IconOptions, install_icons, launcher_name, package_arch, render};
use crate::arch::Architecture;
use crate::archive::create_embedded_tar_script;
use crate::config::options::{self, OptionSpec};
use crate::context::ExecutionContext;
use crate::error::PackagerError;
use crate::fsutil;
use crate::pipeline::{Backend, default_image_name};
use crate::templates::Template;

const APPDIR: &str = "APPDIR";
const ARCH_NEUTRAL: &str = "noarch";

/// Path to a 48x48 PNG icon.
pub const ICON: OptionSpec = OptionSpec::new("package.tar.icon", "Path to 48x48 PNG icon");

/// Path to an SVG icon, used together with [`ICON`].
pub const SVG_ICON: OptionSpec = OptionSpec::new(
    "package.tar.svg-icon",
    "Path to SVG icon (requires package.tar.icon)",
);

/// Desktop entry categories.
pub const CATEGORY: OptionSpec = OptionSpec::with_default(
    "package.tar.category",
    "Development;Java;IDE;",
    "Categories for the desktop entry",
);

/// Custom installer script template.
pub const SCRIPT_TEMPLATE_PATH: OptionSpec =
    OptionSpec::new("package.tar.template", "Path to custom installer script template");

/// Custom desktop file template.
pub const DESKTOP_TEMPLATE_PATH: OptionSpec = OptionSpec::new(
    "package.tar.desktop-template",
    "Path to custom .desktop template",
);

/// Custom launcher script template.
pub const LAUNCHER_TEMPLATE_PATH: OptionSpec = OptionSpec::new(
    "package.tar.launcher-template",
    "Path to custom launcher script template",
);

/// Installer script template.
pub const SCRIPT_TEMPLATE: Template = Template::new(
    "tar.script.template",
    SCRIPT_TEMPLATE_PATH,
    include_str!("../../resources/templates/tar.script.template"),
);

/// Desktop entry template, rendered from configuration only.
pub const DESKTOP_TEMPLATE: Template = Template::new(
    "tar.desktop.template",
    DESKTOP_TEMPLATE_PATH,
    include_str!("../../resources/templates/tar.desktop.template"),
);

/// Launcher script template, embedded in the installer verbatim.
pub const LAUNCHER_TEMPLATE: Template = Template::new(
    "tar.launcher.template",
    LAUNCHER_TEMPLATE_PATH,
    include_str!("../../resources/templates/tar.launcher.template"),
);

/// Options understood by this backend.
pub const OPTIONS: &[OptionSpec] = &[
    ICON,
    SVG_ICON,
    CATEGORY,
    SCRIPT_TEMPLATE_PATH,
    DESKTOP_TEMPLATE_PATH,
    LAUNCHER_TEMPLATE_PATH,
];

/// Templates rendered by this backend.
pub const TEMPLATES: &[Template] = &[SCRIPT_TEMPLATE, DESKTOP_TEMPLATE, LAUNCHER_TEMPLATE];

const ICONS: IconOptions = IconOptions {
    png: ICON,
    svg: SVG_ICON,
};

const fn arch_label(arch: Architecture) -> &'static str {
    match arch {
        Architecture::X86_64 => "x86_64",
        Architecture::Aarch64 => "aarch64",
    }
}

/// Builds self-extracting `.sh` installers.
#[derive(Debug, Clone)]
pub struct TarScriptBackend {
    arch: String,
}

impl TarScriptBackend {
    /// Resolve the architecture label.
    #[must_use]
    pub fn new(ctx: &ExecutionContext) -> Self {
        Self {
            arch: package_arch(ctx, arch_label, ARCH_NEUTRAL),
        }
    }

    fn render_script(&self, ctx: &ExecutionContext, image: &Path) -> Result<String> {
        let app_dir = launcher_name(&image.join(APPDIR).join("bin"))?;
        let app_name = ctx.value(&options::PACKAGE_NAME).unwrap_or(&app_dir);
        let app_name_safe = super::sanitize_package_name(app_name);
        let desktop = ctx.replace_tokens(&DESKTOP_TEMPLATE.load(ctx)?)?;
        let launcher = LAUNCHER_TEMPLATE.load(ctx)?;
        tracing::debug!("rendering installer for {app_name} ({})", self.arch);
        Ok(render(
            ctx,
            &SCRIPT_TEMPLATE.load(ctx)?,
            &[
                ("package.tar.app_name_safe", app_name_safe.as_str()),
                ("package.tar.app_name", app_name),
                ("package.tar.app_dir", app_dir.as_str()),
                ("package.tar.desktop", desktop.trim_end()),
                ("package.tar.launcher", launcher.trim_end()),
            ],
        )?)
    }
}

impl Backend for TarScriptBackend {
    fn name(&self) -> &'static str {
        super::PackagerKind::TarScript.name()
    }

    fn image_name(&self, ctx: &ExecutionContext, _input: &Path) -> Result<String> {
        Ok(format!("{}.{}", default_image_name(ctx)?, self.arch))
    }

    fn app_path(&self, image: &Path) -> PathBuf {
        image.join(APPDIR)
    }

    fn customize_image(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        let app = self.app_path(image);
        let exec = launcher_name(&app.join("bin"))?;
        let launcher_dir = app.join("launcher");
        install_icons(
            ctx,
            &ICONS,
            &launcher_dir.join(format!("{exec}.png")),
            &launcher_dir.join(format!("{exec}.svg")),
        )
    }

    fn build_package(&self, ctx: &ExecutionContext, image: &Path) -> Result<PathBuf> {
        let file_name = image
            .file_name()
            .map(|n| format!("{}.sh", n.to_string_lossy()))
            .ok_or_else(|| PackagerError::InvalidInput(image.to_path_buf()))?;
        let package = ctx.destination().join(file_name);
        let script = self.render_script(ctx, image)?;
        create_embedded_tar_script(&script, image, &package)?;
        fsutil::set_executable(&package)?;
        Ok(package)
    }
}
