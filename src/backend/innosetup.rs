//! Windows installer backend driven by the Inno Setup compiler.
//!
//! The image holds the application under a directory named after its
//! launcher, an optional license file, and the generated `.iss` script:
//!
//! ```text
//! <name>-<version>-InnoSetup/
//!   <exec>/bin/<exec>64.exe
//!   <exec>/etc/<exec>.ico
//!   license.txt | license.rtf
//!   <exec>.iss
//! ```
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use super::{BUILTIN_ICO_ICON, write_resource};
use crate::arch::Architecture;
use crate::config::options::{self, OptionSpec};
use crate::context::ExecutionContext;
use crate::error::{PackagerError, RootKind};
use crate::fsutil;
use crate::pattern::find;
use crate::pipeline::{Backend, default_image_name};
use crate::templates::Template;

const APPDIR: &str = "APPDIR";
const LAUNCHER_SUFFIX: &str = "64.exe";
const OUTPUT_DIR: &str = "Output";

/// Path to the Inno Setup compiler (`ISCC.exe`).
pub const TOOL: OptionSpec = OptionSpec::new(
    "package.innosetup.tool",
    "Path to the Inno Setup compiler (ISCC.exe)",
);

/// Path to a Windows `.ico` icon.
pub const ICON: OptionSpec = OptionSpec::new("package.innosetup.icon", "Path to .ico icon");

/// Path to a `.txt` or `.rtf` license shown by the installer.
pub const LICENSE: OptionSpec = OptionSpec::new(
    "package.innosetup.license",
    "Path to license file (.txt or .rtf)",
);

/// Installer `AppId`.
pub const APPID: OptionSpec = OptionSpec::new(
    "package.innosetup.appid",
    "Installer AppId, defaults to the application name",
);

/// Custom `.iss` template.
pub const ISS_TEMPLATE_PATH: OptionSpec =
    OptionSpec::new("package.innosetup.template", "Path to custom .iss template");

/// Inno Setup script template.
pub const ISS_TEMPLATE: Template = Template::new(
    "innosetup.iss.template",
    ISS_TEMPLATE_PATH,
    include_str!("../../resources/templates/innosetup.iss.template"),
);

/// Options understood by this backend.
pub const OPTIONS: &[OptionSpec] = &[TOOL, ICON, LICENSE, APPID, ISS_TEMPLATE_PATH];

/// Templates rendered by this backend.
pub const TEMPLATES: &[Template] = &[ISS_TEMPLATE];

/// Builds Windows `.exe` installers.
#[derive(Debug, Clone, Copy, Default)]
pub struct InnoSetupBackend;

impl InnoSetupBackend {
    /// Create the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Launcher base name: `bin/<exec>64.exe` gives `<exec>`.
fn exec_name(bin_dir: &Path) -> Result<String> {
    fsutil::sorted_entries(bin_dir)?
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy())
        .find_map(|n| n.strip_suffix(LAUNCHER_SUFFIX).map(str::to_string))
        .ok_or_else(|| PackagerError::MissingLauncher(bin_dir.to_path_buf()).into())
}

/// The `<exec>` directory of `image`: the one child holding
/// `bin/<exec>64.exe` under its own name.
fn app_dir(image: &Path) -> Result<PathBuf> {
    let mut found: Vec<PathBuf> = fsutil::sorted_entries(image)?
        .into_iter()
        .filter(|dir| {
            dir.file_name().is_some_and(|name| {
                dir.join("bin")
                    .join(format!("{}{LAUNCHER_SUFFIX}", name.to_string_lossy()))
                    .is_file()
            })
        })
        .collect();
    if found.len() != 1 {
        return Err(PackagerError::AmbiguousRoot {
            kind: RootKind::Application,
            path: image.to_path_buf(),
            found: found.len(),
        }
        .into());
    }
    Ok(found.remove(0))
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Replace characters Windows forbids in file names with `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

fn without_whitespace(text: &str, replacement: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(replacement)
}

fn crlf_lines<I: IntoIterator<Item = String>>(lines: I) -> String {
    lines.into_iter().map(|l| l + "\r\n").collect()
}

fn install_delete_section(entries: &[PathBuf]) -> String {
    crlf_lines(entries.iter().filter_map(|p| p.file_name()).map(|name| {
        format!(
            "Type: filesandordirs; Name: \"{{app}}\\{}\"",
            name.to_string_lossy()
        )
    }))
}

fn files_section(exec: &str, entries: &[PathBuf]) -> String {
    crlf_lines(entries.iter().filter_map(|p| {
        let name = p.file_name()?.to_string_lossy();
        Some(if p.is_dir() {
            format!(
                "Source: \"{exec}\\{name}\\*\"; DestDir: \"{{app}}\\{name}\"; \
                 Flags: ignoreversion recursesubdirs createallsubdirs"
            )
        } else {
            format!("Source: \"{exec}\\{name}\"; DestDir: \"{{app}}\"; Flags: ignoreversion")
        })
    }))
}

fn copy_license(ctx: &ExecutionContext, image: &Path) -> Result<()> {
    let Some(license) = ctx.path_value(&LICENSE) else {
        return Ok(());
    };
    let lower = license.to_string_lossy().to_lowercase();
    let target = if lower.ends_with(".txt") {
        "license.txt"
    } else if lower.ends_with(".rtf") {
        "license.rtf"
    } else {
        return Err(PackagerError::InvalidValue {
            key: LICENSE.key.to_string(),
            message: format!("{} is not a .txt or .rtf file", license.display()),
        }
        .into());
    };
    fsutil::copy_file(&license, &image.join(target))
}

fn render_script(ctx: &ExecutionContext, image: &Path, exec: &str) -> Result<String> {
    let template = crlf_lines(ISS_TEMPLATE.load(ctx)?.lines().map(str::to_string));
    let entries = fsutil::sorted_entries(&image.join(exec))?;

    let app_name = ctx.value(&options::PACKAGE_NAME).unwrap_or(exec);
    let app_name_safe = sanitize(app_name);
    let app_id = ctx.value(&APPID).unwrap_or(app_name);
    let version = ctx.require(&options::PACKAGE_VERSION)?;
    let publisher = ctx
        .value(&options::PACKAGE_PUBLISHER)
        .map(|p| format!("AppPublisher={p}"))
        .unwrap_or_default();
    let url = ctx
        .value(&options::PACKAGE_URL)
        .map(|u| format!("AppPublisherURL={u}"))
        .unwrap_or_default();
    let license = ["license.txt", "license.rtf"]
        .into_iter()
        .find(|name| image.join(name).exists())
        .map(|name| format!("LicenseFile={name}"))
        .unwrap_or_default();
    let parameters = if ctx.value(&options::PACKAGE_RUNTIME).is_some() {
        "Parameters: \"--jdkhome \"\"{app}\\jdk\"\"\";"
    } else {
        ""
    };
    let arch_suffix = ctx
        .value(&options::PACKAGE_ARCH)
        .map(|a| format!("-{}", without_whitespace(&sanitize(a), "")))
        .unwrap_or_default();
    let output = format!(
        "{}-{}{arch_suffix}",
        without_whitespace(&app_name_safe, "-"),
        without_whitespace(&sanitize(version), "-"),
    );
    let install_delete = install_delete_section(&entries);
    let files = files_section(exec, &entries);

    Ok(crate::tokens::substitute(
        &template,
        &[
            ("APP_ID", app_id),
            ("APP_NAME", app_name),
            ("APP_NAME_SAFE", app_name_safe.as_str()),
            ("APP_VERSION", version),
            ("APP_PUBLISHER", publisher.as_str()),
            ("APP_PUBLISHER_URL", url.as_str()),
            ("APP_LICENSE", license.as_str()),
            ("OUTPUT_FILENAME", output.as_str()),
            ("INSTALL_DELETE", install_delete.as_str()),
            ("FILES", files.as_str()),
            ("EXEC_NAME", exec),
            ("PARAMETERS", parameters),
        ],
    )?)
}

impl Backend for InnoSetupBackend {
    fn name(&self) -> &'static str {
        super::PackagerKind::InnoSetup.name()
    }

    fn check_image_requirements(&self, ctx: &ExecutionContext) -> Result<()> {
        if let Some(arch) = ctx.value(&options::PACKAGE_ARCH)
            && !Architecture::X86_64.is_synonym(arch)
        {
            tracing::warn!("{arch} is not supported by Inno Setup installers, building for x86_64");
        }
        Ok(())
    }

    fn check_package_requirements(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.value(&TOOL).is_none() {
            return Err(PackagerError::MissingRequirement(format!(
                "{} must point to the Inno Setup compiler",
                TOOL.key
            ))
            .into());
        }
        Ok(())
    }

    fn image_name(&self, ctx: &ExecutionContext, _input: &Path) -> Result<String> {
        Ok(format!("{}-InnoSetup", default_image_name(ctx)?))
    }

    fn app_path(&self, image: &Path) -> PathBuf {
        image.join(APPDIR)
    }

    fn root_path(&self, image: &Path, _app: &Path) -> Result<PathBuf> {
        app_dir(image)
    }

    fn merged_app_path(&self, image: &Path, app: &Path) -> Result<PathBuf> {
        self.root_path(image, app)
    }

    fn customize_image(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        let exec = exec_name(&self.app_path(image).join("bin"))?;
        let app_dir = image.join(&exec);
        fs::rename(self.app_path(image), &app_dir)
            .with_context(|| format!("moving application to {}", app_dir.display()))?;

        let ico = app_dir.join("etc").join(format!("{exec}.ico"));
        match ctx.path_value(&ICON) {
            Some(path) => fsutil::copy_file(&path, &ico)?,
            None => write_resource(&ico, BUILTIN_ICO_ICON)?,
        }
        copy_license(ctx, image)
    }

    fn finalize_image(&self, ctx: &ExecutionContext, image: &Path) -> Result<()> {
        let exec = dir_name(&app_dir(image)?);
        let script = render_script(ctx, image, &exec)?;
        fsutil::write_new(&image.join(format!("{exec}.iss")), script)
    }

    fn build_package(&self, ctx: &ExecutionContext, image: &Path) -> Result<PathBuf> {
        let tool = ctx.path_value(&TOOL).ok_or_else(|| {
            PackagerError::MissingRequirement(format!("{} is not set", TOOL.key))
        })?;
        let iss = find(image, "*.iss")
            .with_context(|| format!("searching {}", image.display()))?
            .into_iter()
            .next()
            .ok_or_else(|| PackagerError::InvalidInput(image.to_path_buf()))?;
        let iss_name = iss
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ctx.exec_in(image, &tool.display().to_string(), &[iss_name])?;

        let output = image.join(OUTPUT_DIR);
        let exe = find(&output, "*.exe")
            .with_context(|| format!("searching {}", output.display()))?
            .into_iter()
            .next()
            .ok_or_else(|| PackagerError::InvalidInput(output.clone()))?;
        let Some(file_name) = exe.file_name() else {
            return Err(PackagerError::InvalidInput(exe).into());
        };
        let package = ctx.destination().join(file_name);
        fsutil::move_file(&exe, &package)?;
        fsutil::delete_files(&output)?;
        Ok(package)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::exec::{ExecResult, MockExecutor};
    use std::sync::Arc;

    #[test]
    fn exec_name_strips_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["app", "app.exe", "app64.exe"] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        assert_eq!(exec_name(tmp.path()).unwrap(), "app");
    }

    #[test]
    fn app_dir_ignores_merged_bin_directories() {
        let tmp = tempfile::tempdir().unwrap();
        for dir in ["aaa/bin", "app/bin", "app/jdk/bin"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        fs::write(tmp.path().join("aaa/bin/tool64.exe"), "").unwrap();
        fs::write(tmp.path().join("app/bin/app64.exe"), "").unwrap();
        let dir = app_dir(tmp.path()).unwrap();
        assert_eq!(dir, tmp.path().join("app"));
        assert_eq!(dir_name(&dir), "app");
    }

    #[test]
    fn app_dir_must_be_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let err = app_dir(tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackagerError>(),
            Some(PackagerError::AmbiguousRoot { found: 0, .. })
        ));
        for name in ["one", "two"] {
            fs::create_dir_all(tmp.path().join(name).join("bin")).unwrap();
            fs::write(tmp.path().join(format!("{name}/bin/{name}64.exe")), "").unwrap();
        }
        let err = app_dir(tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackagerError>(),
            Some(PackagerError::AmbiguousRoot { found: 2, .. })
        ));
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize("A<B>:C?"), "A_B__C_");
        assert_eq!(without_whitespace("My  App 2", "-"), "My-App-2");
    }

    #[test]
    fn sections_use_crlf() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("bin")).unwrap();
        fs::write(tmp.path().join("LICENSE"), "").unwrap();
        let entries = fsutil::sorted_entries(tmp.path()).unwrap();
        assert_eq!(
            install_delete_section(&entries),
            "Type: filesandordirs; Name: \"{app}\\LICENSE\"\r\n\
             Type: filesandordirs; Name: \"{app}\\bin\"\r\n"
        );
        assert_eq!(
            files_section("app", &entries),
            "Source: \"app\\LICENSE\"; DestDir: \"{app}\"; Flags: ignoreversion\r\n\
             Source: \"app\\bin\\*\"; DestDir: \"{app}\\bin\"; \
             Flags: ignoreversion recursesubdirs createallsubdirs\r\n"
        );
    }

    #[test]
    fn license_extension_is_checked() {
        let tmp = tempfile::tempdir().unwrap();
        let license = tmp.path().join("LICENSE.md");
        fs::write(&license, "").unwrap();
        let config = Configuration::builder()
            .option(&LICENSE, license.display().to_string())
            .build();
        let ctx = ExecutionContext::new(config, tmp.path());
        let err = copy_license(&ctx, tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackagerError>(),
            Some(PackagerError::InvalidValue { .. })
        ));
    }

    #[test]
    fn tool_is_required() {
        let ctx = ExecutionContext::new(Configuration::default(), "/tmp/out");
        let err = InnoSetupBackend::new()
            .check_package_requirements(&ctx)
            .unwrap_err();
        assert!(err.to_string().contains("package.innosetup.tool"));
    }

    #[test]
    fn build_runs_compiler_in_image() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("App-1.0-InnoSetup");
        fs::create_dir_all(&image).unwrap();
        fs::write(image.join("app.iss"), "").unwrap();
        let output = image.join("Output");
        let expected_dir = image.clone();

        let mut mock = MockExecutor::new();
        mock.expect_run_in()
            .withf(move |dir, _, args| dir == expected_dir && args == ["app.iss".to_string()])
            .returning(move |_, _, _| {
                fs::create_dir_all(&output).unwrap();
                fs::write(output.join("App-1.0.exe"), "exe").unwrap();
                Ok(ExecResult::ok())
            });
        let config = Configuration::builder()
            .set("package.name", "App")
            .option(&TOOL, "/opt/iscc/ISCC.exe")
            .build();
        let ctx = ExecutionContext::with_executor(config, tmp.path(), Arc::new(mock));

        let package = InnoSetupBackend::new().build_package(&ctx, &image).unwrap();
        assert_eq!(package, tmp.path().join("App-1.0.exe"));
        assert!(package.is_file());
        assert!(!image.join("Output").exists());
    }

    #[test]
    fn compiler_failure_is_tool_failed() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("app.iss"), "").unwrap();
        let mut mock = MockExecutor::new();
        mock.expect_run_in()
            .returning(|_, _, _| Ok(ExecResult::failed(1)));
        let config = Configuration::builder()
            .option(&TOOL, "/opt/iscc/ISCC.exe")
            .build();
        let ctx = ExecutionContext::with_executor(config, tmp.path(), Arc::new(mock));
        let err = InnoSetupBackend::new()
            .build_package(&ctx, tmp.path())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackagerError>(),
            Some(PackagerError::ToolFailed { .. })
        ));
    }
}
