//! RPM package backend.
//!
//! The image is an `rpmbuild` top directory:
//!
//! ```text
//! <name>-<version>.<arch>/
//!   BUILDROOT/<name>-<version>-0.<arch>/usr/...
//!   RPMS/
//!   SPECS/<name>.spec
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
use crate::pattern::find;
use crate::pipeline::Backend;
use crate::templates::Template;

const RPM: &str = "rpm";
const RPMBUILD: &str = "rpmbuild";
const APPDIR: &str = "APPDIR";
const ARCH_NEUTRAL: &str = "noarch";

/// Path to a 48x48 PNG icon.
pub const ICON: OptionSpec = OptionSpec::new("package.rpm.icon", "Path to 48x48 PNG icon");

/// Path to an SVG icon, used together with [`ICON`].
pub const SVG_ICON: OptionSpec = OptionSpec::new(
    "package.rpm.svg-icon",
    "Path to SVG icon (requires package.rpm.icon)",
);

/// Desktop file name without extension.
pub const DESKTOP_FILENAME: OptionSpec = OptionSpec::new(
    "package.rpm.desktop-filename",
    "Name of the .desktop file, defaults to the package name",
);

/// `StartupWMClass` of the desktop entry.
pub const WMCLASS: OptionSpec = OptionSpec::new(
    "package.rpm.wmclass",
    "StartupWMClass for the desktop entry, defaults to the application name",
);

/// Desktop entry categories.
pub const CATEGORY: OptionSpec = OptionSpec::with_default(
    "package.rpm.category",
    "Development;Java;IDE;",
    "Categories for the desktop entry",
);

/// `Packager:` field.
pub const MAINTAINER: OptionSpec =
    OptionSpec::new("package.rpm.maintainer", "Packager name and email");

/// `License:` field.
pub const LICENSE: OptionSpec = OptionSpec::new("package.rpm.license", "License identifier");

/// `Group:` field.
pub const GROUP: OptionSpec = OptionSpec::new("package.rpm.group", "Package group");

/// Custom spec file template.
pub const SPEC_TEMPLATE_PATH: OptionSpec =
    OptionSpec::new("package.rpm.spec-template", "Path to custom .spec template");

/// Custom desktop file template.
pub const DESKTOP_TEMPLATE_PATH: OptionSpec = OptionSpec::new(
    "package.rpm.desktop-template",
    "Path to custom .desktop template",
);

/// Custom launcher script template.
pub const LAUNCHER_TEMPLATE_PATH: OptionSpec = OptionSpec::new(
    "package.rpm.launcher-template",
    "Path to custom launcher script template",
);

/// `.spec` template.
pub const SPEC_TEMPLATE: Template = Template::new(
    "rpm.spec.template",
    SPEC_TEMPLATE_PATH,
    include_str!("../../resources/templates/rpm.spec.template"),
);

/// Desktop entry template.
pub const DESKTOP_TEMPLATE: Template = Template::new(
    "rpm.desktop.template",
    DESKTOP_TEMPLATE_PATH,
    include_str!("../../resources/templates/rpm.desktop.template"),
);

/// `/usr/bin` launcher template.
pub const LAUNCHER_TEMPLATE: Template = Template::new(
    "rpm.launcher.template",
    LAUNCHER_TEMPLATE_PATH,
    include_str!("../../resources/templates/rpm.launcher.template"),
);

/// Options understood by this backend.
pub const OPTIONS: &[OptionSpec] = &[
    ICON,
    SVG_ICON,
    DESKTOP_FILENAME,
    WMCLASS,
    CATEGORY,
    MAINTAINER,
    LICENSE,
    GROUP,
    SPEC_TEMPLATE_PATH,
    DESKTOP_TEMPLATE_PATH,
    LAUNCHER_TEMPLATE_PATH,
];

/// Templates rendered by this backend.
pub const TEMPLATES: &[Template] = &[SPEC_TEMPLATE, DESKTOP_TEMPLATE, LAUNCHER_TEMPLATE];

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

/// Lowercase and replace anything outside `[a-z0-9+.~]` with `~`.
fn sanitize_version(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '~') {
                c
            } else {
                '~'
            }
        })
        .collect()
}

/// Builds `.rpm` packages with `rpmbuild`.
#[derive(Debug, Clone)]
pub struct RpmBackend {
    name: String,
    version: String,
    arch: String,
}

impl RpmBackend {
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

    fn build_root(&self, image: &Path) -> PathBuf {
        image
            .join("BUILDROOT")
            .join(format!("{}-{}-0.{}", self.name, self.version, self.arch))
    }

    fn spec_path(&self, image: &Path) -> PathBuf {
        image.join("SPECS").join(format!("{}.spec", self.name))
    }

    fn write_launcher(&self, ctx: &ExecutionContext, usr: &Path, exec: &str) -> Result<()> {
        let location = format!("/usr/lib/{}", self.name);
        let script = render(
            ctx,
            &LAUNCHER_TEMPLATE.load(ctx)?,
            &[("PACKAGE", location.as_str()), ("EXEC", exec)],
        )?;
        let bin = usr.join("bin").join(exec);
        fsutil::write_new(&bin, script)?;
        fsutil::set_executable(&bin)
    }

    fn write_desktop_file(&self, ctx: &ExecutionContext, usr: &Path, exec: &str) -> Result<()> {
        let exec_path = format!("/usr/bin/{exec}");
        let wm_class = ctx
            .value(&WMCLASS)
            .or_else(|| ctx.value(&options::PACKAGE_NAME))
            .unwrap_or(&self.name);
        let desktop = render(
            ctx,
            &DESKTOP_TEMPLATE.load(ctx)?,
            &[
                ("EXEC", exec_path.as_str()),
                ("ICON", self.name.as_str()),
                ("CATEGORY", ctx.value_or_default(&CATEGORY).unwrap_or_default()),
                ("WM_CLASS", wm_class),
            ],
        )?;
        let file_name = ctx
            .value(&DESKTOP_FILENAME)
            .map_or_else(|| self.name.clone(), super::sanitize_package_name);
        let path = usr
            .join("share/applications")
            .join(format!("{file_name}.desktop"));
        fsutil::write_new(&path, desktop)
    }

    fn write_spec(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        let files = spec_file_list(&build_root_of(image)?)?;
        let line = |prefix: &str, option: &OptionSpec| {
            ctx.value(option)
                .map(|v| format!("{prefix}: {v}"))
                .unwrap_or_default()
        };
        let summary = format!(
            "Summary: {}",
            ctx.value(&options::PACKAGE_DESCRIPTION)
                .or_else(|| ctx.value(&options::PACKAGE_NAME))
                .unwrap_or(&self.name)
        );
        let recommends = if ctx.value(&options::PACKAGE_RUNTIME).is_some() {
            ""
        } else {
            "Recommends: java-devel >= 17"
        };
        let license = line("License", &LICENSE);
        let group = line("Group", &GROUP);
        let url = line("URL", &options::PACKAGE_URL);
        let vendor = line("Vendor", &options::PACKAGE_PUBLISHER);
        let packager = line("Packager", &MAINTAINER);
        let spec = render(
            ctx,
            &SPEC_TEMPLATE.load(ctx)?,
            &[
                ("RPM_PACKAGE", self.name.as_str()),
                ("RPM_VERSION", self.version.as_str()),
                ("RPM_ARCH", self.arch.as_str()),
                ("RPM_SUMMARY_LINE", summary.as_str()),
                ("RPM_LICENSE_LINE", license.as_str()),
                ("RPM_GROUP_LINE", group.as_str()),
                ("RPM_URL_LINE", url.as_str()),
                ("RPM_VENDOR_LINE", vendor.as_str()),
                ("RPM_MAINTAINER_LINE", packager.as_str()),
                ("RPM_RECOMMENDS_LINE", recommends),
                (
                    "RPM_DESCRIPTION",
                    ctx.value(&options::PACKAGE_DESCRIPTION)
                        .unwrap_or_default(),
                ),
                ("RPM_FILES", files.as_str()),
            ],
        )?;
        fsutil::write_new(&self.spec_path(image), spec)
    }
}

/// The single `BUILDROOT/*` directory of `image`.
fn build_root_of(image: &Path) -> Result<PathBuf> {
    let mut roots = find(image, "BUILDROOT/*")
        .with_context(|| format!("searching {}", image.display()))?;
    if roots.len() != 1 {
        return Err(PackagerError::AmbiguousRoot {
            kind: crate::error::RootKind::Application,
            path: image.join("BUILDROOT"),
            found: roots.len(),
        }
        .into());
    }
    Ok(roots.remove(0))
}

/// `%files` entries for everything under `root`.
///
/// Application directories directly under `usr/lib` are listed whole; every
/// other non-directory is listed individually. Entries are sorted, prefixed
/// with `/` and each followed by a newline.
fn spec_file_list(root: &Path) -> Result<String> {
    let app_parent = root.join("usr/lib");
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.with_context(|| format!("reading {}", root.display()))?;
        let path = entry.path();
        let listed = if entry.file_type().is_dir() {
            path.parent() == Some(app_parent.as_path())
        } else {
            !path.starts_with(&app_parent)
        };
        if listed && let Ok(relative) = path.strip_prefix(root) {
            entries.push(relative.to_path_buf());
        }
    }
    entries.sort();
    Ok(entries
        .iter()
        .map(|p| {
            let joined: Vec<_> = p.iter().map(|c| c.to_string_lossy()).collect();
            format!("/{}\n", joined.join("/"))
        })
        .collect())
}

impl Backend for RpmBackend {
    fn name(&self) -> &'static str {
        super::PackagerKind::Rpm.name()
    }

    fn check_package_requirements(&self, ctx: &ExecutionContext) -> Result<()> {
        tracing::debug!("checking for {RPM} and {RPMBUILD}");
        for tool in [RPM, RPMBUILD] {
            if !ctx.has_tool(tool) {
                return Err(PackagerError::MissingRequirement(format!(
                    "{tool} not found on PATH; install the rpm-build tools"
                ))
                .into());
            }
        }
        Ok(())
    }

    fn image_name(&self, _ctx: &ExecutionContext, _input: &Path) -> Result<String> {
        Ok(format!("{}-{}.{}", self.name, self.version, self.arch))
    }

    fn app_path(&self, image: &Path) -> PathBuf {
        image.join("usr/lib").join(APPDIR)
    }

    fn root_path(&self, image: &Path, _app: &Path) -> Result<PathBuf> {
        build_root_of(image)
    }

    fn merged_app_path(&self, image: &Path, _app: &Path) -> Result<PathBuf> {
        Ok(build_root_of(image)?.join("usr/lib").join(&self.name))
    }

    fn customize_image(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        let usr = image.join("usr");
        let app_dir = usr.join("lib").join(&self.name);
        fs::rename(self.app_path(image), &app_dir)
            .with_context(|| format!("moving application to {}", app_dir.display()))?;
        let exec = launcher_name(&app_dir.join("bin"))?;

        self.write_launcher(ctx, &usr, &exec)?;
        let icons = usr.join("share/icons/hicolor");
        install_icons(
            ctx,
            &ICONS,
            &icons.join(format!("48x48/apps/{}.png", self.name)),
            &icons.join(format!("scalable/apps/{}.svg", self.name)),
        )?;
        self.write_desktop_file(ctx, &usr, &exec)?;

        let build_root = self.build_root(image);
        fs::create_dir_all(&build_root)
            .with_context(|| format!("creating {}", build_root.display()))?;
        fs::rename(&usr, build_root.join("usr"))
            .with_context(|| format!("moving {} into {}", usr.display(), build_root.display()))?;
        fs::create_dir_all(image.join("RPMS")).context("creating RPMS")?;
        Ok(())
    }

    fn finalize_image(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        self.write_spec(ctx, image)
    }

    fn build_package(&self, ctx: &ExecutionContext, image: &Path) -> Result<PathBuf> {
        let image = std::path::absolute(image)
            .with_context(|| format!("resolving {}", image.display()))?;
        let spec = self.spec_path(&image);
        ctx.exec(
            RPMBUILD,
            &[
                "--target".to_string(),
                self.arch.clone(),
                "--define".to_string(),
                format!("_topdir {}", image.display()),
                "-bb".to_string(),
                spec.display().to_string(),
                "--noclean".to_string(),
            ],
        )?;

        let rpms = image.join("RPMS").join(&self.arch);
        let built = find(&rpms, "*.rpm")
            .with_context(|| format!("searching {}", rpms.display()))?
            .into_iter()
            .next()
            .ok_or_else(|| PackagerError::InvalidInput(rpms.clone()))?;
        let Some(file_name) = built.file_name() else {
            return Err(PackagerError::InvalidInput(built).into());
        };
        let package = ctx.destination().join(file_name);
        fsutil::move_file(&built, &package)?;
        Ok(package)
    }
}
