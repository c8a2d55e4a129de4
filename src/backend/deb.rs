//! Debian package backend.
//!
//! The image is the root of the installed file system plus a `DEBIAN`
//! control directory:
//!
//! ```text
//! <name>_<version>_<arch>/
//!   DEBIAN/control
//!   usr/bin/<exec>
//!   usr/lib/<name>/...
//!   usr/share/applications/<name>.desktop
//!   usr/share/icons/hicolor/{48x48,scalable}/apps/<name>.{png,svg}
//! ```
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use walkdir::WalkDir;

use super::{IconOptions, install_icons, launcher_name, package_arch, package_name, render};
use crate::arch::Architecture;
use crate::config::options::{self, OptionSpec};
use crate::context::ExecutionContext;
use crate::error::PackagerError;
use crate::fsutil;
use crate::pipeline::Backend;
use crate::templates::Template;

const DPKG: &str = "dpkg";
const DPKG_DEB: &str = "dpkg-deb";
const APPDIR: &str = "APPDIR";
const ARCH_NEUTRAL: &str = "all";

/// Path to a 48x48 PNG icon.
pub const ICON: OptionSpec = OptionSpec::new("package.deb.icon", "Path to 48x48 PNG icon");

/// Path to an SVG icon, used together with [`ICON`].
pub const SVG_ICON: OptionSpec = OptionSpec::new(
    "package.deb.svg-icon",
    "Path to SVG icon (requires package.deb.icon)",
);

/// Desktop file name without extension.
pub const DESKTOP_FILENAME: OptionSpec = OptionSpec::new(
    "package.deb.desktop-filename",
    "Name of the .desktop file, defaults to the package name",
);

/// `StartupWMClass` of the desktop entry.
pub const WMCLASS: OptionSpec = OptionSpec::new(
    "package.deb.wmclass",
    "StartupWMClass for the desktop entry, defaults to the application name",
);

/// Desktop entry categories.
pub const CATEGORY: OptionSpec = OptionSpec::with_default(
    "package.deb.category",
    "Development;Java;IDE;",
    "Categories for the desktop entry",
);

/// Package maintainer.
pub const MAINTAINER: OptionSpec = OptionSpec::new(
    "package.deb.maintainer",
    "Maintainer name and email, defaults to package.publisher",
);

/// Debian archive section.
pub const SECTION: OptionSpec =
    OptionSpec::with_default("package.deb.section", "java", "Debian archive section");

/// Custom control file template.
pub const CONTROL_TEMPLATE_PATH: OptionSpec = OptionSpec::new(
    "package.deb.control-template",
    "Path to custom DEBIAN/control template",
);

/// Custom desktop file template.
pub const DESKTOP_TEMPLATE_PATH: OptionSpec = OptionSpec::new(
    "package.deb.desktop-template",
    "Path to custom .desktop template",
);

/// Custom launcher script template.
pub const LAUNCHER_TEMPLATE_PATH: OptionSpec = OptionSpec::new(
    "package.deb.launcher-template",
    "Path to custom launcher script template",
);

/// `DEBIAN/control` template.
pub const CONTROL_TEMPLATE: Template = Template::new(
    "deb.control.template",
    CONTROL_TEMPLATE_PATH,
    include_str!("../../resources/templates/deb.control.template"),
);

/// Desktop entry template.
pub const DESKTOP_TEMPLATE: Template = Template::new(
    "deb.desktop.template",
    DESKTOP_TEMPLATE_PATH,
    include_str!("../../resources/templates/deb.desktop.template"),
);

/// `/usr/bin` launcher template.
pub const LAUNCHER_TEMPLATE: Template = Template::new(
    "deb.launcher.template",
    LAUNCHER_TEMPLATE_PATH,
    include_str!("../../resources/templates/deb.launcher.template"),
);

/// Options understood by this backend.
pub const OPTIONS: &[OptionSpec] = &[
    ICON,
    SVG_ICON,
    DESKTOP_FILENAME,
    WMCLASS,
    CATEGORY,
    MAINTAINER,
    SECTION,
    CONTROL_TEMPLATE_PATH,
    DESKTOP_TEMPLATE_PATH,
    LAUNCHER_TEMPLATE_PATH,
];

/// Templates rendered by this backend.
pub const TEMPLATES: &[Template] = &[CONTROL_TEMPLATE, DESKTOP_TEMPLATE, LAUNCHER_TEMPLATE];

const ICONS: IconOptions = IconOptions {
    png: ICON,
    svg: SVG_ICON,
};

const fn arch_label(arch: Architecture) -> &'static str {
    match arch {
        Architecture::X86_64 => "amd64",
        Architecture::Aarch64 => "arm64",
    }
}

/// Keep `[A-Za-z0-9.+~-]` and replace everything else with `~`.
fn sanitize_version(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | '-') {
                c
            } else {
                '~'
            }
        })
        .collect()
}

/// Builds `.deb` packages with `dpkg-deb`.
#[derive(Debug, Clone)]
pub struct DebBackend {
    name: String,
    version: String,
    arch: String,
}

impl DebBackend {
    /// Resolve the package name, version and architecture.
    ///
    /// # Errors
    ///
    /// Returns an error if `package.name` is missing or unusable.
    pub fn new(ctx: &ExecutionContext) -> Result<Self, PackagerError> {
        Ok(Self {
            name: package_name(ctx)?,
            version: sanitize_version(ctx.require(&options::PACKAGE_VERSION)?),
            arch: package_arch(ctx, arch_label, ARCH_NEUTRAL),
        })
    }

    fn app_dir(&self, image: &Path) -> PathBuf {
        image.join("usr/lib").join(&self.name)
    }

    fn write_launcher(&self, ctx: &ExecutionContext, image: &Path, exec: &str) -> Result<()> {
        let location = format!("/usr/lib/{}", self.name);
        let script = render(
            ctx,
            &LAUNCHER_TEMPLATE.load(ctx)?,
            &[("PACKAGE", location.as_str()), ("EXEC", exec)],
        )?;
        let bin = image.join("usr/bin").join(exec);
        fsutil::write_new(&bin, script)?;
        fsutil::set_executable(&bin)
    }

    fn write_desktop_file(&self, ctx: &ExecutionContext, image: &Path, exec: &str) -> Result<()> {
        let exec_path = format!("/usr/bin/{exec}");
        let wm_class = ctx
            .value(&WMCLASS)
            .or_else(|| ctx.value(&options::PACKAGE_NAME))
            .unwrap_or(&self.name);
        let category = ctx.value_or_default(&CATEGORY).unwrap_or_default();
        let desktop = render(
            ctx,
            &DESKTOP_TEMPLATE.load(ctx)?,
            &[
                ("EXEC", exec_path.as_str()),
                ("ICON", self.name.as_str()),
                ("CATEGORY", category),
                ("WM_CLASS", wm_class),
            ],
        )?;
        let file_name = ctx
            .value(&DESKTOP_FILENAME)
            .map_or_else(|| self.name.clone(), super::sanitize_package_name);
        let path = image
            .join("usr/share/applications")
            .join(format!("{file_name}.desktop"));
        fsutil::write_new(&path, desktop)
    }

    fn write_control(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        let installed_size = installed_size_kib(image)?.to_string();
        let maintainer = ctx
            .value(&MAINTAINER)
            .or_else(|| ctx.value(&options::PACKAGE_PUBLISHER))
            .unwrap_or(&self.name);
        let description = ctx
            .value(&options::PACKAGE_DESCRIPTION)
            .or_else(|| ctx.value(&options::PACKAGE_NAME))
            .unwrap_or(&self.name);
        let recommends = if ctx.value(&options::PACKAGE_RUNTIME).is_some() {
            ""
        } else {
            "Recommends: java17-sdk"
        };
        let control = render(
            ctx,
            &CONTROL_TEMPLATE.load(ctx)?,
            &[
                ("DEB_PACKAGE", self.name.as_str()),
                ("DEB_VERSION", self.version.as_str()),
                ("DEB_ARCH", self.arch.as_str()),
                ("DEB_SECTION", ctx.value_or_default(&SECTION).unwrap_or_default()),
                ("DEB_MAINTAINER", maintainer),
                ("DEB_DESCRIPTION", description),
                ("DEB_RECOMMENDS_LINE", recommends),
                ("DEB_INSTALLED_SIZE", installed_size.as_str()),
            ],
        )?;
        fsutil::write_new(&image.join("DEBIAN/control"), drop_blank_lines(&control))
    }
}

/// Remove empty lines left by optional fields.
fn drop_blank_lines(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("{l}\n"))
        .collect()
}

/// Total size of regular files under `image`, excluding `DEBIAN`, in KiB
/// rounded up.
fn installed_size_kib(image: &Path) -> Result<u64> {
    let mut bytes = 0_u64;
    let walker = WalkDir::new(image)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == "DEBIAN"));
    for entry in walker {
        let entry = entry.with_context(|| format!("reading {}", image.display()))?;
        if entry.file_type().is_file() {
            bytes += entry
                .metadata()
                .with_context(|| format!("reading {}", entry.path().display()))?
                .len();
        }
    }
    Ok(bytes.div_ceil(1024))
}

impl Backend for DebBackend {
    fn name(&self) -> &'static str {
        super::PackagerKind::Deb.name()
    }

    fn check_package_requirements(&self, ctx: &ExecutionContext) -> Result<()> {
        for tool in [DPKG, DPKG_DEB] {
            if !ctx.has_tool(tool) {
                return Err(PackagerError::MissingRequirement(format!(
                    "{tool} not found on PATH"
                ))
                .into());
            }
        }
        Ok(())
    }

    fn image_name(&self, _ctx: &ExecutionContext, _input: &Path) -> Result<String> {
        Ok(format!("{}_{}_{}", self.name, self.version, self.arch))
    }

    fn app_path(&self, image: &Path) -> PathBuf {
        image.join("usr/lib").join(APPDIR)
    }

    fn merged_app_path(&self, image: &Path, _app: &Path) -> Result<PathBuf> {
        Ok(self.app_dir(image))
    }

    fn customize_image(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        let app_dir = self.app_dir(image);
        fs::rename(self.app_path(image), &app_dir)
            .with_context(|| format!("moving application to {}", app_dir.display()))?;
        let exec = launcher_name(&app_dir.join("bin"))?;

        self.write_launcher(ctx, image, &exec)?;
        let icons = image.join("usr/share/icons/hicolor");
        install_icons(
            ctx,
            &ICONS,
            &icons.join(format!("48x48/apps/{}.png", self.name)),
            &icons.join(format!("scalable/apps/{}.svg", self.name)),
        )?;
        self.write_desktop_file(ctx, image, &exec)
    }

    fn finalize_image(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        self.write_control(ctx, image)
    }

    fn build_package(&self, ctx: &ExecutionContext, image: &Path) -> Result<PathBuf> {
        let file_name = image
            .file_name()
            .map(|n| format!("{}.deb", n.to_string_lossy()))
            .ok_or_else(|| PackagerError::InvalidInput(image.to_path_buf()))?;
        let package = ctx.destination().join(file_name);
        ctx.exec(
            DPKG_DEB,
            &[
                "--build".to_string(),
                "--root-owner-group".to_string(),
                image.display().to_string(),
                package.display().to_string(),
            ],
        )?;
        Ok(package)
    }
}
