//! Image construction pipeline shared by every installer backend.
//!
//! A [`Pipeline`] drives a [`Backend`] through a fixed sequence of stages:
//!
//! ```text
//! Created -> AppExtracted -> RuntimeExtracted? -> Customized
//!         -> Filtered? -> Merged? -> Finalized -> PackageBuilt
//! ```
//!
//! Optional stages run only when the matching configuration key is set.
//! Backends only decide where things go and how the final artifact is
//! produced; extraction, filtering and merging are the same for all.
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::archive::extract_archive;
use crate::config::options;
use crate::context::ExecutionContext;
use crate::error::{PackagerError, RootKind};
use crate::fsutil;
use crate::logging::STAGE_TARGET;
use crate::pattern::{find, find_dirs};

/// Sub-patterns that identify an application root directory.
pub const APP_ROOT_PATTERNS: &[&str] = &["bin/*", "etc/*.conf"];

/// Sub-patterns that identify a runtime root directory.
pub const RUNTIME_ROOT_PATTERNS: &[&str] = &["bin/java*"];

/// Maximum depth searched for an application or runtime root.
pub const ROOT_SEARCH_DEPTH: usize = 5;

/// Merge source directory copied into the root path.
pub const MERGE_ROOT_ALIAS: &str = "__ROOT";

/// Merge source directory copied into the application path.
pub const MERGE_APP_ALIAS: &str = "__APP";

const JDKHOME_PLACEHOLDER: &str = "#jdkhome=\"/path/to/jdk\"";

/// Stages an image passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    /// Empty image directory created.
    Created,
    /// Application tree in place.
    AppExtracted,
    /// Runtime tree in place.
    RuntimeExtracted,
    /// Backend layout applied.
    Customized,
    /// Removal pattern applied.
    Filtered,
    /// Merge source copied in.
    Merged,
    /// Backend descriptors written.
    Finalized,
    /// Installer artifact produced.
    PackageBuilt,
}

impl ImageStage {
    /// Progress message logged when the stage starts.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Created => "Creating image",
            Self::AppExtracted => "Adding application",
            Self::RuntimeExtracted => "Adding runtime",
            Self::Customized => "Customizing image",
            Self::Filtered => "Removing files",
            Self::Merged => "Merging files",
            Self::Finalized => "Finalizing image",
            Self::PackageBuilt => "Building package",
        }
    }
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

fn enter(stage: ImageStage, path: &Path) {
    tracing::info!(target: STAGE_TARGET, "{stage}: {}", path.display());
}

/// Installer-specific hooks called by [`Pipeline`].
///
/// Only [`customize_image`](Backend::customize_image) and
/// [`build_package`](Backend::build_package) have no default.
pub trait Backend {
    /// Packager type name, e.g. `linux-deb`.
    fn name(&self) -> &'static str;

    /// Check that an image can be built.
    ///
    /// # Errors
    ///
    /// Returns an error if a requirement is not met.
    fn check_image_requirements(&self, _ctx: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Check that a package can be built from an image.
    ///
    /// # Errors
    ///
    /// Returns an error if a requirement is not met.
    fn check_package_requirements(&self, _ctx: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Name of the image directory created under the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing.
    fn image_name(&self, ctx: &ExecutionContext, _input: &Path) -> Result<String> {
        Ok(default_image_name(ctx)?)
    }

    /// Where the application tree goes inside `image`.
    fn app_path(&self, image: &Path) -> PathBuf {
        image.to_path_buf()
    }

    /// Where the runtime tree goes.
    fn runtime_path(&self, _image: &Path, app: &Path) -> PathBuf {
        app.join("jdk")
    }

    /// Destination of the `__ROOT` merge directory, resolved after
    /// customization.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined from the image.
    fn root_path(&self, image: &Path, _app: &Path) -> Result<PathBuf> {
        Ok(image.to_path_buf())
    }

    /// Destination of the `__APP` merge directory, resolved after
    /// customization. Backends that move the application tree while
    /// customizing return its new location.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined from the image.
    fn merged_app_path(&self, _image: &Path, app: &Path) -> Result<PathBuf> {
        Ok(app.to_path_buf())
    }

    /// Apply the installer layout: launchers, icons, desktop entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be modified.
    fn customize_image(&self, ctx: &ExecutionContext, image: &Path) -> Result<()>;

    /// Write descriptors that depend on the final image content.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be modified.
    fn finalize_image(&self, _ctx: &ExecutionContext, _image: &Path) -> Result<()> {
        Ok(())
    }

    /// Produce the installer from a finalized image and return its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the external tool is missing or fails.
    fn build_package(&self, ctx: &ExecutionContext, image: &Path) -> Result<PathBuf>;
}

/// `sanitize(name)-sanitize(version)`, replacing characters outside
/// `[A-Za-z0-9._-]` with `_`.
///
/// # Errors
///
/// Returns [`PackagerError::MissingValue`] if `package.name` is not set.
pub fn default_image_name(ctx: &ExecutionContext) -> Result<String, PackagerError> {
    let name = ctx.require(&options::PACKAGE_NAME)?;
    let version = ctx.require(&options::PACKAGE_VERSION)?;
    Ok(format!("{}-{}", sanitize(name), sanitize(version)))
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Drives a [`Backend`] through image creation and packaging.
pub struct Pipeline<'a, B: Backend + ?Sized> {
    ctx: &'a ExecutionContext,
    backend: &'a B,
}

impl<B: Backend + ?Sized> fmt::Debug for Pipeline<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("ctx", self.ctx)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl<'a, B: Backend + ?Sized> Pipeline<'a, B> {
    /// Pipeline running `backend` with `ctx`.
    #[must_use]
    pub const fn new(ctx: &'a ExecutionContext, backend: &'a B) -> Self {
        Self { ctx, backend }
    }

    /// Check everything needed before [`create_image`](Self::create_image).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is missing or a backend requirement
    /// is not met.
    pub fn validate_create_image(&self) -> Result<()> {
        self.ctx.require(&options::PACKAGE_NAME)?;
        self.backend.check_image_requirements(self.ctx)
    }

    /// Check everything needed before
    /// [`create_package`](Self::create_package).
    ///
    /// # Errors
    ///
    /// Returns an error if a backend requirement is not met.
    pub fn validate_create_package(&self) -> Result<()> {
        self.backend.check_package_requirements(self.ctx)
    }

    /// Build an image from `input`, an application directory or archive,
    /// and return the image directory.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ImageExists`] if the image directory is
    /// already present, [`PackagerError::AmbiguousRoot`] if the application
    /// or runtime root is not unique, and any error raised by a hook.
    pub fn create_image(&self, input: &Path) -> Result<PathBuf> {
        let name = self.backend.image_name(self.ctx, input)?;
        let destination = self.ctx.destination();
        fs::create_dir_all(destination)
            .with_context(|| format!("creating {}", destination.display()))?;
        let image = destination.join(name);

        enter(ImageStage::Created, &image);
        match fs::create_dir(&image) {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(PackagerError::ImageExists(image).into());
            }
            other => other.with_context(|| format!("creating {}", image.display()))?,
        }

        let app = self.backend.app_path(&image);
        enter(ImageStage::AppExtracted, input);
        install_tree(input, &app, RootKind::Application, APP_ROOT_PATTERNS)?;

        if let Some(runtime) = self.ctx.path_value(&options::PACKAGE_RUNTIME) {
            enter(ImageStage::RuntimeExtracted, &runtime);
            let runtime_dir = self.backend.runtime_path(&image, &app);
            install_tree(&runtime, &runtime_dir, RootKind::Runtime, RUNTIME_ROOT_PATTERNS)?;
            if let Ok(relative) = runtime_dir.strip_prefix(&app) {
                link_runtime(&app, relative)?;
            }
        }

        enter(ImageStage::Customized, &image);
        self.backend.customize_image(self.ctx, &image)?;

        if let Some(pattern) = self.ctx.value(&options::PACKAGE_REMOVE) {
            enter(ImageStage::Filtered, Path::new(pattern));
            remove_matching(&image, pattern)?;
        }

        if let Some(source) = self.ctx.path_value(&options::PACKAGE_MERGE) {
            enter(ImageStage::Merged, &source);
            let root = self.backend.root_path(&image, &app)?;
            let app = self.backend.merged_app_path(&image, &app)?;
            merge(&source, &image, &root, &app)?;
        }

        enter(ImageStage::Finalized, &image);
        self.backend.finalize_image(self.ctx, &image)?;
        Ok(image)
    }

    /// Build the installer from a finalized `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to produce the package.
    pub fn create_package(&self, image: &Path) -> Result<PathBuf> {
        enter(ImageStage::PackageBuilt, image);
        let package = self.backend.build_package(self.ctx, image)?;
        tracing::info!("created {}", package.display());
        Ok(package)
    }
}

/// Scratch directory removed when dropped.
fn scratch_dir(prefix: &str) -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .context("creating scratch directory")
}

/// The single directory under `search` matching `patterns`.
fn unique_root(search: &Path, source: &Path, kind: RootKind, patterns: &[&str]) -> Result<PathBuf> {
    let mut roots = find_dirs(search, ROOT_SEARCH_DEPTH, patterns)
        .with_context(|| format!("searching {}", search.display()))?;
    if roots.len() != 1 {
        return Err(PackagerError::AmbiguousRoot {
            kind,
            path: source.to_path_buf(),
            found: roots.len(),
        }
        .into());
    }
    let root = roots.remove(0);
    tracing::debug!("{kind} root: {}", root.display());
    Ok(root)
}

/// Copy (directory) or extract (archive) the unique root found in `source`
/// into `target`.
fn install_tree(source: &Path, target: &Path, kind: RootKind, patterns: &[&str]) -> Result<()> {
    let meta =
        fs::metadata(source).map_err(|_| PackagerError::InvalidInput(source.to_path_buf()))?;
    if meta.is_dir() {
        let root = unique_root(source, source, kind, patterns)?;
        fsutil::copy_files(&root, target)
    } else if meta.is_file() {
        let scratch = scratch_dir("app-packager-extract")?;
        extract_archive(source, scratch.path())?;
        let root = unique_root(scratch.path(), source, kind, patterns)?;
        fsutil::move_files(&root, target)
    } else {
        Err(PackagerError::InvalidInput(source.to_path_buf()).into())
    }
}

/// Enable the commented `jdkhome` line in every `etc/*.conf` under `app`.
fn link_runtime(app: &Path, relative: &Path) -> Result<()> {
    let jdkhome = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    let replacement = format!("jdkhome=\"{jdkhome}\"");
    for conf in find(app, "etc/*.conf").with_context(|| format!("searching {}", app.display()))? {
        if !conf.is_file() {
            continue;
        }
        let contents =
            fs::read_to_string(&conf).with_context(|| format!("reading {}", conf.display()))?;
        if contents.contains(JDKHOME_PLACEHOLDER) {
            tracing::debug!("setting {replacement} in {}", conf.display());
            fs::write(&conf, contents.replace(JDKHOME_PLACEHOLDER, &replacement))
                .with_context(|| format!("writing {}", conf.display()))?;
        }
    }
    Ok(())
}

fn remove_matching(image: &Path, pattern: &str) -> Result<()> {
    let matches = find(image, pattern).with_context(|| format!("searching {}", image.display()))?;
    for path in matches {
        tracing::debug!("removing {}", path.display());
        fsutil::delete_files(&path)?;
    }
    Ok(())
}

fn merge(source: &Path, image: &Path, root: &Path, app: &Path) -> Result<()> {
    let meta =
        fs::metadata(source).map_err(|_| PackagerError::InvalidInput(source.to_path_buf()))?;
    if meta.is_dir() {
        merge_dir(source, image, root, app)
    } else if meta.is_file() {
        let scratch = scratch_dir("app-packager-merge")?;
        extract_archive(source, scratch.path())?;
        merge_dir(scratch.path(), image, root, app)
    } else {
        Err(PackagerError::InvalidInput(source.to_path_buf()).into())
    }
}

fn merge_dir(source: &Path, image: &Path, root: &Path, app: &Path) -> Result<()> {
    for entry in fsutil::sorted_entries(source)? {
        let Some(name) = entry.file_name() else {
            continue;
        };
        if entry.is_dir() {
            let dest = if name == MERGE_ROOT_ALIAS {
                root.to_path_buf()
            } else if name == MERGE_APP_ALIAS {
                app.to_path_buf()
            } else {
                image.join(name)
            };
            tracing::debug!("merging {} into {}", entry.display(), dest.display());
            fsutil::copy_files(&entry, &dest)?;
        } else {
            let dest = image.join(name);
            fsutil::copy_file(&entry, &dest)?;
            fsutil::ensure_writable(&dest)?;
        }
    }
    Ok(())
}
