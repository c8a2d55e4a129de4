//! Processor architectures and their naming synonyms.
use std::fmt;
use std::path::Path;

/// A supported processor architecture.
///
/// Declaration order is significant: [`Architecture::detect_from_path`]
/// reports the first member whose synonym appears in a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// 64-bit x86.
    X86_64,
    /// 64-bit ARM.
    Aarch64,
}

impl Architecture {
    /// Every architecture, in detection order.
    pub const ALL: [Self; 2] = [Self::X86_64, Self::Aarch64];

    /// Lowercase names commonly used for this architecture.
    #[must_use]
    pub const fn synonyms(self) -> &'static [&'static str] {
        match self {
            Self::X86_64 => &["x86_64", "x86-64", "amd64", "x64"],
            Self::Aarch64 => &["aarch64", "arm64"],
        }
    }

    /// Whether `value` names this architecture, ignoring case.
    #[must_use]
    pub fn is_synonym(self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.synonyms().iter().any(|s| *s == value)
    }

    /// Find the architecture named by `value`, ignoring case.
    #[must_use]
    pub fn from_name(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|arch| arch.is_synonym(value))
    }

    /// Guess the architecture from the file name of `path`.
    ///
    /// Only the final path component is inspected, lowercased, and searched
    /// for any synonym as a substring. Returns `None` when nothing matches.
    #[must_use]
    pub fn detect_from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|arch| arch.synonyms().iter().any(|s| name.contains(s)))
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => f.write_str("x86_64"),
            Self::Aarch64 => f.write_str("aarch64"),
        }
    }
}
