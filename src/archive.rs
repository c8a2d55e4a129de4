//! Archive extraction and creation.
//!
//! Zip, tar and gzip-compressed tar archives are recognised by their
//! leading bytes rather than by file extension.
use anyhow::{Context as _, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read as _, Write as _};
use std::path::{Component, Path};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::error::PackagerError;

/// Archive container formats understood by [`extract_archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// A zip archive.
    Zip,
    /// An uncompressed tar archive.
    Tar,
    /// A gzip-compressed tar archive.
    TarGz,
}

impl ArchiveFormat {
    /// Identify the format of `archive` from its header.
    ///
    /// Returns `Ok(None)` for files that are not a recognised archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn detect(archive: &Path) -> io::Result<Option<Self>> {
        let mut header = Vec::with_capacity(512);
        File::open(archive)?.take(512).read_to_end(&mut header)?;
        Ok(Self::from_header(&header))
    }

    fn from_header(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(Self::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if header.get(257..262) == Some(b"ustar".as_slice()) {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> PackagerError {
    PackagerError::Archive {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Extract `archive` into `dest`, preserving Unix permission bits.
///
/// # Errors
///
/// Returns an error if the format is not recognised or any entry cannot be
/// extracted.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let format = ArchiveFormat::detect(archive)
        .with_context(|| format!("reading {}", archive.display()))?
        .ok_or_else(|| PackagerError::UnsupportedArchive(archive.to_path_buf()))?;
    tracing::debug!(
        "extracting {} ({format:?}) into {}",
        archive.display(),
        dest.display()
    );
    fs::create_dir_all(dest).with_context(|| format!("creating directory {}", dest.display()))?;
    let file = File::open(archive).with_context(|| format!("opening {}", archive.display()))?;
    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(BufReader::new(file))
                .map_err(|e| archive_error(archive, e))?;
            zip.extract(dest).map_err(|e| archive_error(archive, e))?;
        }
        ArchiveFormat::Tar => unpack_tar(tar::Archive::new(BufReader::new(file)), archive, dest)?,
        ArchiveFormat::TarGz => unpack_tar(
            tar::Archive::new(GzDecoder::new(BufReader::new(file))),
            archive,
            dest,
        )?,
    }
    Ok(())
}

fn unpack_tar<R: io::Read>(mut tar: tar::Archive<R>, archive: &Path, dest: &Path) -> Result<()> {
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|e| archive_error(archive, e))?;
    Ok(())
}

/// Entry name for `path` inside an archive, relative to `base` and using
/// `/` separators.
fn entry_name(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

#[cfg(unix)]
fn unix_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt as _;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn unix_mode(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() { 0o755 } else { 0o644 }
}

/// Create a zip archive of the contents of `source_dir`. Entry names are
/// relative to `source_dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or the archive cannot
/// be written.
pub fn create_zip_archive(source_dir: &Path, archive: &Path) -> Result<()> {
    let file = File::create(archive).with_context(|| format!("creating {}", archive.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options_for = |mode: u32| {
        SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(mode)
    };

    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("reading {}", source_dir.display()))?;
        let Some(name) = entry_name(source_dir, entry.path()) else {
            continue;
        };
        let meta = entry
            .path()
            .symlink_metadata()
            .with_context(|| format!("reading {}", entry.path().display()))?;
        let entry_options = options_for(unix_mode(&meta));
        if entry.file_type().is_dir() {
            zip.add_directory(name, entry_options)
                .map_err(|e| archive_error(archive, e))?;
        } else if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())?;
            zip.add_symlink(name, target.to_string_lossy(), entry_options)
                .map_err(|e| archive_error(archive, e))?;
        } else {
            zip.start_file(name, entry_options)
                .map_err(|e| archive_error(archive, e))?;
            let mut input = File::open(entry.path())
                .with_context(|| format!("opening {}", entry.path().display()))?;
            io::copy(&mut input, &mut zip)?;
        }
    }
    zip.finish().map_err(|e| archive_error(archive, e))?;
    Ok(())
}

/// Write `script` followed by a gzip-compressed tar of the contents of
/// `image` to `dest`.
///
/// Tar entries are relative to `image`, so its top-level directories become
/// the top-level entries of the embedded archive.
///
/// # Errors
///
/// Returns an error if `dest` cannot be written or the image cannot be read.
pub fn create_embedded_tar_script(script: &str, image: &Path, dest: &Path) -> Result<()> {
    let mut file = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    file.write_all(script.as_bytes())
        .with_context(|| format!("writing {}", dest.display()))?;
    if !script.ends_with('\n') {
        file.write_all(b"\n")?;
    }

    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    for entry in crate::fsutil::sorted_entries(image)? {
        let Some(name) = entry_name(image, &entry) else {
            continue;
        };
        let added = if entry.symlink_metadata()?.is_dir() {
            builder.append_dir_all(&name, &entry)
        } else {
            builder.append_path_with_name(&entry, &name)
        };
        added.with_context(|| format!("adding {} to {}", entry.display(), dest.display()))?;
    }
    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .with_context(|| format!("finishing {}", dest.display()))?
        .flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample_tree(parent: &Path) -> std::path::PathBuf {
        let root = parent.join("App-1.0");
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::write(root.join("bin/app"), "#!/bin/sh\n").unwrap();
        fs::write(root.join("etc/app.conf"), "#jdkhome=\"/path/to/jdk\"\n").unwrap();
        root
    }

    #[test]
    fn header_detection() {
        assert_eq!(
            ArchiveFormat::from_header(b"PK\x03\x04rest"),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::from_header(&[0x1f, 0x8b, 0x08]),
            Some(ArchiveFormat::TarGz)
        );
        let mut tar_header = vec![0_u8; 512];
        tar_header[257..262].copy_from_slice(b"ustar");
        assert_eq!(
            ArchiveFormat::from_header(&tar_header),
            Some(ArchiveFormat::Tar)
        );
        assert_eq!(ArchiveFormat::from_header(b"hello"), None);
    }

    #[test]
    fn zip_entries_are_relative_to_source() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_tree(tmp.path());
        let archive = tmp.path().join("app.zip");
        create_zip_archive(&root, &archive).unwrap();

        let out = tmp.path().join("out");
        extract_archive(&archive, &out).unwrap();

        assert!(out.join("bin/app").is_file());
        assert_eq!(
            fs::read_to_string(out.join("etc/app.conf")).unwrap(),
            "#jdkhome=\"/path/to/jdk\"\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn zip_extraction_preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt as _;
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_tree(tmp.path());
        fs::set_permissions(root.join("bin/app"), fs::Permissions::from_mode(0o755)).unwrap();
        let archive = tmp.path().join("app.zip");
        create_zip_archive(&root, &archive).unwrap();

        let out = tmp.path().join("out");
        extract_archive(&archive, &out).unwrap();

        let mode = fs::metadata(out.join("bin/app"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn extracts_tar_gz() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_tree(tmp.path());
        let archive = tmp.path().join("app.tar.gz");
        let file = File::create(&archive).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.append_dir_all("App-1.0", &root).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let out = tmp.path().join("out");
        extract_archive(&archive, &out).unwrap();

        assert!(out.join("etc/app.conf").is_file());
    }

    #[test]
    fn extracts_plain_tar() {
        let tmp = tempfile::tempdir().unwrap();
        let root = sample_tree(tmp.path());
        let archive = tmp.path().join("app.tar");
        let mut builder = tar::Builder::new(File::create(&archive).unwrap());
        builder.append_dir_all("App-1.0", &root).unwrap();
        builder.into_inner().unwrap();

        let out = tmp.path().join("out");
        extract_archive(&archive, &out).unwrap();

        assert!(out.join("bin/app").is_file());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("notes.txt");
        fs::write(&bogus, "just text").unwrap();
        let err = extract_archive(&bogus, &tmp.path().join("out")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackagerError>(),
            Some(PackagerError::UnsupportedArchive(_))
        ));
    }

    #[test]
    fn embedded_tar_script_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("image");
        fs::create_dir_all(image.join("APPDIR/bin")).unwrap();
        fs::write(image.join("APPDIR/bin/app"), "launcher").unwrap();
        let dest = tmp.path().join("installer.sh");

        let script = "#!/bin/sh\nexit 0\n__TARFILE_FOLLOWS__\n";
        create_embedded_tar_script(script, &image, &dest).unwrap();

        let bytes = fs::read(&dest).unwrap();
        assert!(bytes.starts_with(script.as_bytes()));
        let payload = bytes.get(script.len()..).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(payload));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.trim_end_matches('/') == "APPDIR"));
        assert!(names.iter().any(|n| n == "APPDIR/bin/app"));
    }
}
