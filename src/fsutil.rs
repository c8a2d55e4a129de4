//! File-system primitives used while assembling images.
use anyhow::{Context as _, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Recursively copy the contents of `src` into `dst`, creating `dst` if
/// needed.
///
/// Existing files in `dst` are overwritten. Permission bits are preserved,
/// and symbolic links are recreated rather than followed on Unix.
///
/// # Errors
///
/// Returns an error if an entry cannot be read, created or copied.
pub fn copy_files(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("relativizing {}", entry.path().display()))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating directory {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove an existing file or symbolic link at `path`.
///
/// Directories and missing paths are left alone.
///
/// # Errors
///
/// Returns an error if the entry exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok_and(|m| !m.is_dir()) {
        fs::remove_file(path).with_context(|| format!("remove existing: {}", path.display()))?;
    }
    Ok(())
}

/// Copy a single file, preserving its permission bits.
///
/// An existing file or link at `dst` is replaced, never written through.
///
/// # Errors
///
/// Returns an error if the file cannot be copied.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent_dir(dst)?;
    remove_existing(dst)?;
    fs::copy(src, dst)
        .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Copy one non-directory entry, recreating links instead of following them.
fn copy_entry(src: &Path, dst: &Path) -> Result<()> {
    let meta = src
        .symlink_metadata()
        .with_context(|| format!("reading {}", src.display()))?;
    if meta.file_type().is_symlink() {
        ensure_parent_dir(dst)?;
        copy_symlink(src, dst)
    } else {
        copy_file(src, dst)
    }
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).with_context(|| format!("reading link {}", src.display()))?;
    remove_existing(dst)?;
    std::os::unix::fs::symlink(&link, dst)
        .with_context(|| format!("linking {} to {}", dst.display(), link.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    copy_file(src, dst)
}

/// Move the contents of `src` into `dst`, creating `dst` if needed.
///
/// Entries are renamed where possible and copied then deleted otherwise,
/// for example across file systems. `src` itself is left in place.
///
/// # Errors
///
/// Returns an error if an entry cannot be moved.
pub fn move_files(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating directory {}", dst.display()))?;
    let entries =
        fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if fs::rename(&from, &to).is_err() {
            if entry.file_type()?.is_dir() {
                copy_files(&from, &to)?;
            } else {
                copy_entry(&from, &to)?;
            }
            delete_files(&from)?;
        }
    }
    Ok(())
}

/// Move a single file to `dst`, copying then deleting when a rename is not
/// possible.
///
/// # Errors
///
/// Returns an error if the file cannot be moved.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent_dir(dst)?;
    if fs::rename(src, dst).is_err() {
        copy_entry(src, dst)?;
        delete_files(src)?;
    }
    Ok(())
}

/// Delete a file, symbolic link or directory tree. Missing paths are ignored.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn delete_files(path: &Path) -> Result<()> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(());
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("deleting {}", path.display()))
        }
        _ => Ok(()),
    }
}

/// Make sure the owner can write to `path`.
///
/// # Errors
///
/// Returns an error if the permissions cannot be read or changed.
pub fn ensure_writable(path: &Path) -> Result<()> {
    let meta = fs::metadata(path).with_context(|| format!("reading {}", path.display()))?;
    let mut perms = meta.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        if perms.mode() & 0o200 != 0 {
            return Ok(());
        }
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        if !perms.readonly() {
            return Ok(());
        }
        perms.set_readonly(false);
    }
    fs::set_permissions(path, perms)
        .with_context(|| format!("making {} writable", path.display()))
}

/// Mark `path` as `rwxr-xr-x`.
///
/// Platforms without POSIX permissions only get a warning.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed on a platform that
/// supports them.
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        match fs::set_permissions(path, fs::Permissions::from_mode(0o755)) {
            Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                tracing::warn!("cannot set POSIX permissions on {}: {e}", path.display());
                Ok(())
            }
            other => other.with_context(|| format!("setting permissions on {}", path.display())),
        }
    }
    #[cfg(not(unix))]
    {
        tracing::warn!(
            "POSIX permissions are not supported here, {} left unchanged",
            path.display()
        );
        Ok(())
    }
}

/// Write `contents` to a file that must not already exist.
///
/// # Errors
///
/// Returns an error if the file exists or cannot be written.
pub fn write_new(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    use std::io::Write as _;
    ensure_parent_dir(path)?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(contents.as_ref())
        .with_context(|| format!("writing {}", path.display()))
}

/// Sorted list of the immediate children of `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?
    {
        entries.push(
            entry
                .with_context(|| format!("reading entry in {}", dir.display()))?
                .path(),
        );
    }
    entries.sort();
    Ok(entries)
}
