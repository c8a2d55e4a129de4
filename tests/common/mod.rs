// Shared helpers for integration tests.
//
// Builds fake application and runtime trees inside a temporary directory so
// each test can feed the pipeline a realistic input without repeating
// filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use app_packager::archive::create_zip_archive;
use app_packager::config::Configuration;
use app_packager::context::ExecutionContext;

/// Name of the fake runtime archive; its `x64` token marks it as x86_64.
pub const LINUX_RUNTIME: &str = "OpenJDK24U-jdk_x64_linux_hotspot_24.0.1_9";

/// Windows flavour of [`LINUX_RUNTIME`].
pub const WINDOWS_RUNTIME: &str = "OpenJDK24U-jdk_x64_windows_hotspot_24.0.1_9";

/// Create a fake application under `parent/dirname` with the files every
/// packager expects:
///
/// - `bin/<branding>`, `bin/<branding>.exe`, `bin/<branding>64.exe`
/// - `etc/<branding>.conf` with a commented `jdkhome` line
/// - `platform/module`
pub fn build_fake_app(parent: &Path, dirname: &str, branding: &str) -> PathBuf {
    let dir = parent.join(dirname);
    let bin = dir.join("bin");
    let etc = dir.join("etc");
    let platform = dir.join("platform");
    for d in [&bin, &etc, &platform] {
        std::fs::create_dir_all(d).expect("create app dir");
    }
    std::fs::write(bin.join(branding), "#!/bin/sh\n").expect("write launcher");
    std::fs::write(bin.join(format!("{branding}.exe")), "").expect("write exe");
    std::fs::write(bin.join(format!("{branding}64.exe")), "").expect("write exe64");
    std::fs::write(
        etc.join(format!("{branding}.conf")),
        "default_options=\"-J-Xss2m\"\n#jdkhome=\"/path/to/jdk\"\n",
    )
    .expect("write conf");
    std::fs::write(platform.join("module"), "").expect("write module");
    dir
}

/// Create a fake runtime under `parent/dirname` containing `bin/java`
/// (`bin/java.exe` when `windows`).
pub fn build_fake_jdk(parent: &Path, dirname: &str, windows: bool) -> PathBuf {
    let bin = parent.join(dirname).join("bin");
    std::fs::create_dir_all(&bin).expect("create jdk bin");
    let java = if windows { "java.exe" } else { "java" };
    std::fs::write(bin.join(java), "").expect("write java");
    parent.join(dirname)
}

/// Zip `dir` into `parent/<dir name>.zip` and return the archive path.
pub fn zip_dir(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .expect("dir has a name")
        .to_string_lossy()
        .into_owned();
    let archive = dir.with_file_name(format!("{name}.zip"));
    create_zip_archive(dir, &archive).expect("create zip");
    archive
}

/// Zipped fake application `App-1.0-b1` with branding `app`.
pub fn app_zip(parent: &Path) -> PathBuf {
    zip_dir(&build_fake_app(parent, "App-1.0-b1", "app"))
}

/// Zipped fake runtime.
pub fn runtime_zip(parent: &Path, name: &str, windows: bool) -> PathBuf {
    zip_dir(&build_fake_jdk(parent, name, windows))
}

/// Configuration with `package.name = App`, `package.version = 1.0-b1` and
/// any extra `(key, value)` pairs.
pub fn config(extra: &[(&str, &str)]) -> Configuration {
    extra.iter().fold(
        Configuration::builder()
            .set("package.name", "App")
            .set("package.version", "1.0-b1"),
        |b, (k, v)| b.set(*k, *v),
    )
    .build()
}

/// Execution context writing into `dest`.
pub fn context(dest: &Path, extra: &[(&str, &str)]) -> ExecutionContext {
    ExecutionContext::new(config(extra), dest)
}

/// Resolve `/`-separated `fragments` against `path`.
pub fn resolve(path: &Path, fragments: &str) -> PathBuf {
    fragments.split('/').fold(path.to_path_buf(), |p, f| p.join(f))
}
