//! Commands: list packager types and options, save built-in templates.
use std::io::Write;
use std::path::Path;
use std::str::FromStr as _;

use anyhow::Result;

use crate::backend::PackagerKind;
use crate::cli::{OptionsOpts, TemplatesOpts};
use crate::config::options::{GLOBAL_OPTIONS, OptionSpec};
use crate::templates::save_templates;

/// Print every packager type.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub fn run_types() -> Result<()> {
    write_types(&mut std::io::stdout().lock())
}

/// Print configuration options, optionally for one packager only.
///
/// # Errors
///
/// Returns an error if the packager type is unknown or stdout cannot be
/// written.
pub fn run_options(opts: &OptionsOpts) -> Result<()> {
    let kind = opts
        .kind
        .as_deref()
        .map(PackagerKind::from_str)
        .transpose()?;
    write_options(&mut std::io::stdout().lock(), kind)
}

/// Write the built-in templates of one packager into a directory.
///
/// # Errors
///
/// Returns an error if the packager type is unknown or a template file
/// cannot be written.
pub fn run_templates(opts: &TemplatesOpts) -> Result<()> {
    let kind = PackagerKind::from_str(&opts.kind)?;
    save_kind_templates(kind, &opts.dir)
}

fn save_kind_templates(kind: PackagerKind, dir: &Path) -> Result<()> {
    for path in save_templates(kind.templates(), dir)? {
        tracing::info!("wrote {}", path.display());
    }
    Ok(())
}

fn write_types(out: &mut impl Write) -> Result<()> {
    for kind in PackagerKind::ALL {
        writeln!(out, "{:<20} {}", kind.name(), kind.description())?;
    }
    Ok(())
}

fn write_options(out: &mut impl Write, only: Option<PackagerKind>) -> Result<()> {
    if only.is_none() {
        write_section(out, "Global options", GLOBAL_OPTIONS)?;
    }
    for kind in PackagerKind::ALL {
        if only.is_none_or(|k| k == kind) {
            write_section(out, &format!("{kind} options"), kind.options())?;
        }
    }
    Ok(())
}

fn write_section(out: &mut impl Write, title: &str, options: &[OptionSpec]) -> Result<()> {
    writeln!(out, "{title}:")?;
    for option in options {
        match option.default {
            Some(default) => writeln!(out, "  {:<34} {} [default: {default}]", option.key, option.help)?,
            None => writeln!(out, "  {:<34} {}", option.key, option.help)?,
        }
    }
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn types_lists_every_packager() {
        let text = render(|out| write_types(out));
        assert_eq!(text.lines().count(), PackagerKind::ALL.len());
        assert!(text.starts_with("linux-deb "));
        assert!(text.contains("windows-innosetup"));
    }

    #[test]
    fn all_options_include_globals_and_defaults() {
        let text = render(|out| write_options(out, None));
        assert!(text.starts_with("Global options:\n"));
        assert!(text.contains("package.version"));
        assert!(text.contains("[default: 1.0]"));
        assert!(text.contains("linux-rpm options:"));
        assert!(text.contains("package.innosetup.tool"));
    }

    #[test]
    fn options_can_be_filtered_by_type() {
        let text = render(|out| write_options(out, Some(PackagerKind::TarScript)));
        assert!(text.starts_with("linux-tar-script options:\n"));
        assert!(!text.contains("Global options"));
        assert!(!text.contains("package.deb."));
    }

    #[test]
    fn templates_are_saved_once() {
        let tmp = tempfile::tempdir().unwrap();
        save_kind_templates(PackagerKind::Deb, tmp.path()).unwrap();
        assert!(tmp.path().join("deb.control.template").is_file());
        assert!(save_kind_templates(PackagerKind::Deb, tmp.path()).is_err());
    }
}
