//! Integration tests for the staged image pipeline.
#![allow(clippy::expect_used, clippy::unwrap_used)]

// Integration tests for the staged image pipeline.
//
// Each test drives `Pipeline::create_image` with a small in-test `Backend`
// over fake application and runtime trees, then inspects the resulting
// image on disk.

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use app_packager::context::ExecutionContext;
use app_packager::error::{PackagerError, RootKind};
use app_packager::pipeline::{Backend, Pipeline};

use common::{app_zip, build_fake_app, build_fake_jdk, context, resolve, runtime_zip, zip_dir};

/// Backend that keeps the default layout and never builds a package.
struct PlainBackend;

impl Backend for PlainBackend {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn customize_image(&self, _ctx: &ExecutionContext, _image: &Path) -> Result<()> {
        Ok(())
    }

    fn build_package(&self, _ctx: &ExecutionContext, image: &Path) -> Result<PathBuf> {
        Ok(image.to_path_buf())
    }
}

/// Backend that nests the application under `BUILD/usr/lib/app` and adds
/// marker files during customization and finalization.
struct NestedBackend;

impl Backend for NestedBackend {
    fn name(&self) -> &'static str {
        "nested"
    }

    fn app_path(&self, image: &Path) -> PathBuf {
        resolve(image, "BUILD/usr/lib/app")
    }

    fn root_path(&self, image: &Path, _app: &Path) -> Result<PathBuf> {
        Ok(image.join("BUILD"))
    }

    fn customize_image(&self, _ctx: &ExecutionContext, image: &Path) -> Result<()> {
        fs::write(image.join("REMOVE_ME.exe"), "")?;
        Ok(())
    }

    fn finalize_image(&self, _ctx: &ExecutionContext, image: &Path) -> Result<()> {
        fs::write(image.join("LEAVE_ME.exe"), "")?;
        Ok(())
    }

    fn build_package(&self, _ctx: &ExecutionContext, image: &Path) -> Result<PathBuf> {
        Ok(image.to_path_buf())
    }
}

fn create_image(ctx: &ExecutionContext, backend: &dyn Backend, input: &Path) -> Result<PathBuf> {
    let pipeline = Pipeline::new(ctx, backend);
    pipeline.validate_create_image()?;
    pipeline.create_image(input)
}

fn relative_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

#[test]
fn base_image_from_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let input = app_zip(tmp.path());
    let out = tmp.path().join("out");
    let ctx = context(&out, &[]);

    let image = create_image(&ctx, &PlainBackend, &input).unwrap();
    assert_eq!(image, out.join("App-1.0-b1"));
    assert!(resolve(&image, "bin/app").is_file());
    assert!(resolve(&image, "etc/app.conf").is_file());
    assert!(resolve(&image, "platform/module").is_file());
    assert!(!image.join("jdk").exists());
}

#[test]
fn directory_and_archive_inputs_give_same_image() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = build_fake_app(tmp.path(), "App-1.0-b1", "app");
    let archive = zip_dir(&dir);

    let from_dir = create_image(&context(&tmp.path().join("a"), &[]), &PlainBackend, &dir).unwrap();
    let from_zip =
        create_image(&context(&tmp.path().join("b"), &[]), &PlainBackend, &archive).unwrap();
    let files = relative_files(&from_dir);
    assert_eq!(files, relative_files(&from_zip));
    for rel in &files {
        let (a, b) = (from_dir.join(rel), from_zip.join(rel));
        if !a.is_file() {
            continue;
        }
        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap(), "{rel} differs");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode(&a), mode(&b), "{rel} mode differs");
        }
    }
    assert!(dir.join("bin/app").exists(), "directory input must be left intact");
}

#[test]
fn application_root_is_found_below_wrapper_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let wrapper = tmp.path().join("dist");
    build_fake_app(&resolve(&wrapper, "release/inner"), "app-root", "app");
    let archive = zip_dir(&wrapper);

    let image = create_image(&context(&tmp.path().join("out"), &[]), &PlainBackend, &archive)
        .unwrap();
    assert!(resolve(&image, "bin/app").is_file());
    assert!(!image.join("release").exists());
}

#[test]
fn two_application_roots_are_ambiguous() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("bundle");
    build_fake_app(&input, "one", "app");
    build_fake_app(&input, "two", "app");

    let err = create_image(&context(&tmp.path().join("out"), &[]), &PlainBackend, &input)
        .unwrap_err();
    assert!(
        matches!(
            err.downcast_ref::<PackagerError>(),
            Some(PackagerError::AmbiguousRoot {
                kind: RootKind::Application,
                found: 2,
                ..
            })
        ),
        "expected AmbiguousRoot, got {err:#}"
    );
}

#[test]
fn input_without_application_root_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("empty");
    fs::create_dir_all(input.join("docs")).unwrap();

    let err = create_image(&context(&tmp.path().join("out"), &[]), &PlainBackend, &input)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PackagerError>(),
        Some(PackagerError::AmbiguousRoot { found: 0, .. })
    ));
}

#[test]
fn existing_image_is_never_overwritten() {
    let tmp = tempfile::tempdir().unwrap();
    let input = app_zip(tmp.path());
    let out = tmp.path().join("out");
    fs::create_dir_all(out.join("App-1.0-b1")).unwrap();
    fs::write(out.join("App-1.0-b1/keep.txt"), "mine").unwrap();

    let err = create_image(&context(&out, &[]), &PlainBackend, &input).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PackagerError>(),
        Some(PackagerError::ImageExists(_))
    ));
    assert_eq!(fs::read_to_string(out.join("App-1.0-b1/keep.txt")).unwrap(), "mine");
}

#[test]
fn runtime_is_installed_and_linked() {
    let tmp = tempfile::tempdir().unwrap();
    let input = app_zip(tmp.path());
    let runtime = runtime_zip(tmp.path(), common::LINUX_RUNTIME, false);
    let runtime = runtime.display().to_string();
    let ctx = context(&tmp.path().join("out"), &[("package.runtime", runtime.as_str())]);

    let image = create_image(&ctx, &PlainBackend, &input).unwrap();
    assert!(resolve(&image, "jdk/bin/java").is_file());
    let conf = fs::read_to_string(resolve(&image, "etc/app.conf")).unwrap();
    assert!(conf.contains("\njdkhome=\"jdk\"\n"), "{conf}");
    assert!(!conf.contains("#jdkhome"));
    assert!(conf.starts_with("default_options="));
}

#[test]
fn runtime_directory_input_is_copied() {
    let tmp = tempfile::tempdir().unwrap();
    let input = app_zip(tmp.path());
    let jdk = build_fake_jdk(&tmp.path().join("jdks"), "jdk-21", false);
    let jdk = jdk.display().to_string();
    let ctx = context(&tmp.path().join("out"), &[("package.runtime", jdk.as_str())]);

    let image = create_image(&ctx, &PlainBackend, &input).unwrap();
    assert!(resolve(&image, "jdk/bin/java").is_file());
}

#[test]
fn remove_pattern_filters_customized_files_only() {
    let tmp = tempfile::tempdir().unwrap();
    let input = app_zip(tmp.path());
    let ctx = context(
        &tmp.path().join("out"),
        &[("package.remove", "{*.exe,**/platform}")],
    );

    let image = create_image(&ctx, &NestedBackend, &input).unwrap();
    let app = resolve(&image, "BUILD/usr/lib/app");
    assert!(app.join("bin/app").is_file());
    assert!(app.join("bin/app64.exe").is_file(), "nested exe is out of reach of *.exe");
    assert!(!app.join("platform").exists());
    assert!(!image.join("REMOVE_ME.exe").exists());
    assert!(image.join("LEAVE_ME.exe").exists());
}

#[test]
fn merge_archive_routes_aliases() {
    let tmp = tempfile::tempdir().unwrap();
    let input = app_zip(tmp.path());

    let merge_root = tmp.path().join("mergeRoot");
    let desktop = resolve(&merge_root, "__ROOT/usr/share/applications/app.desktop");
    let bat = resolve(&merge_root, "__APP/bin/app.bat");
    let build = resolve(&merge_root, "config/build");
    for file in [&desktop, &bat, &build] {
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, "").unwrap();
    }
    let readme = merge_root.join("README");
    fs::write(&readme, "read me\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        fs::set_permissions(&readme, fs::Permissions::from_mode(0o444)).unwrap();
    }
    let merge = zip_dir(&merge_root).display().to_string();

    let ctx = context(
        &tmp.path().join("out"),
        &[("package.merge", merge.as_str()), ("package.remove", "**/platform")],
    );
    let image = create_image(&ctx, &NestedBackend, &input).unwrap();

    assert!(resolve(&image, "BUILD/usr/lib/app/bin/app.bat").is_file());
    assert!(resolve(&image, "BUILD/usr/share/applications/app.desktop").is_file());
    assert!(resolve(&image, "config/build").is_file());
    let readme = image.join("README");
    assert_eq!(fs::read_to_string(&readme).unwrap(), "read me\n");
    assert!(!fs::metadata(&readme).unwrap().permissions().readonly());
    assert!(!image.join("__ROOT").exists());
    assert!(!image.join("__APP").exists());
}

#[test]
fn merge_directory_is_supported() {
    let tmp = tempfile::tempdir().unwrap();
    let input = app_zip(tmp.path());
    let merge_root = tmp.path().join("extra");
    fs::create_dir_all(merge_root.join("__APP/etc")).unwrap();
    fs::write(merge_root.join("__APP/etc/extra.conf"), "x=1\n").unwrap();
    let merge = merge_root.display().to_string();

    let ctx = context(&tmp.path().join("out"), &[("package.merge", merge.as_str())]);
    let image = create_image(&ctx, &PlainBackend, &input).unwrap();
    assert!(resolve(&image, "etc/extra.conf").is_file());
    assert!(resolve(&image, "etc/app.conf").is_file());
}

#[cfg(unix)]
#[test]
fn merge_replaces_image_links_without_following_them() {
    let tmp = tempfile::tempdir().unwrap();
    let input = build_fake_app(tmp.path(), "App-1.0-b1", "app");
    std::os::unix::fs::symlink("app.conf", input.join("etc/link.conf")).unwrap();
    let merge_root = tmp.path().join("extra");
    fs::create_dir_all(merge_root.join("__APP/etc")).unwrap();
    fs::write(merge_root.join("__APP/etc/link.conf"), "merged\n").unwrap();
    let merge = merge_root.display().to_string();

    let ctx = context(&tmp.path().join("out"), &[("package.merge", merge.as_str())]);
    let image = create_image(&ctx, &PlainBackend, &input).unwrap();

    let link = resolve(&image, "etc/link.conf");
    assert!(!fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_to_string(&link).unwrap(), "merged\n");
    let conf = fs::read_to_string(resolve(&image, "etc/app.conf")).unwrap();
    assert!(conf.contains("#jdkhome="), "{conf}");
}

#[cfg(unix)]
#[test]
fn merge_overwrites_read_only_files() {
    use std::os::unix::fs::PermissionsExt as _;
    let tmp = tempfile::tempdir().unwrap();
    let input = build_fake_app(tmp.path(), "App-1.0-b1", "app");
    let locked = input.join("etc/locked.conf");
    fs::write(&locked, "old\n").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o444)).unwrap();
    let merge_root = tmp.path().join("extra");
    fs::create_dir_all(merge_root.join("__APP/etc")).unwrap();
    fs::write(merge_root.join("__APP/etc/locked.conf"), "new\n").unwrap();
    let merge = merge_root.display().to_string();

    let ctx = context(&tmp.path().join("out"), &[("package.merge", merge.as_str())]);
    let image = create_image(&ctx, &PlainBackend, &input).unwrap();
    assert_eq!(
        fs::read_to_string(resolve(&image, "etc/locked.conf")).unwrap(),
        "new\n"
    );
}

#[test]
fn missing_input_is_invalid() {
    let tmp = tempfile::tempdir().unwrap();
    let err = create_image(
        &context(&tmp.path().join("out"), &[]),
        &PlainBackend,
        &tmp.path().join("nope.zip"),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PackagerError>(),
        Some(PackagerError::InvalidInput(_))
    ));
}
