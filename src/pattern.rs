//! Glob-style path patterns with brace alternation.
//!
//! Patterns are matched against paths relative to a search root, one path
//! segment at a time:
//!
//! - a literal segment matches exactly (case-sensitive)
//! - `*` matches any run of characters within a segment, `?` exactly one
//! - `**` as a whole segment matches zero or more segments
//! - `{a,b}` alternation is expanded before matching, may nest, and may
//!   contain wildcards
//!
//! `{}` expands to a single empty alternative, and an unclosed `{` is taken
//! literally. Dot-files are ordinary names.
use std::collections::VecDeque;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    AnyDepth,
    Glob(Vec<char>),
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    alternatives: Vec<Vec<Segment>>,
}

impl Pattern {
    /// Compile `pattern`. Every string is a valid pattern.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let alternatives = expand_braces(pattern)
            .iter()
            .map(|alt| {
                alt.split('/')
                    .map(|seg| {
                        if seg == "**" {
                            Segment::AnyDepth
                        } else {
                            Segment::Glob(seg.chars().collect())
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            source: pattern.to_string(),
            alternatives,
        }
    }

    /// The pattern text as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the relative path `path` matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let segments = segments_of(path);
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        self.matches_segments(&segments)
    }

    fn matches_segments(&self, path: &[&str]) -> bool {
        self.alternatives
            .iter()
            .any(|alt| match_segments(alt, path))
    }

    /// Whether some descendant of the relative path `path` could match.
    fn may_match_below(&self, path: &[&str]) -> bool {
        self.alternatives
            .iter()
            .any(|alt| viable_prefix(alt, path))
    }
}

/// A set of patterns matched as a union.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile every pattern in `patterns`.
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| Pattern::new(p.as_ref())).collect(),
        }
    }

    /// Whether any pattern matches the relative path `path`.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let segments = segments_of(path);
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        self.patterns.iter().any(|p| p.matches_segments(&segments))
    }

    fn matches_segments(&self, path: &[&str]) -> bool {
        self.patterns.iter().any(|p| p.matches_segments(path))
    }

    fn may_match_below(&self, path: &[&str]) -> bool {
        self.patterns.iter().any(|p| p.may_match_below(path))
    }
}

impl From<Pattern> for PatternSet {
    fn from(pattern: Pattern) -> Self {
        Self {
            patterns: vec![pattern],
        }
    }
}

/// Find every descendant of `root` whose root-relative path matches
/// `pattern`, in lexical order.
///
/// # Errors
///
/// Returns an error if `root` or any visited directory cannot be read.
pub fn find(root: &Path, pattern: &str) -> io::Result<Vec<PathBuf>> {
    find_matching(root, &PatternSet::from(Pattern::new(pattern)))
}

/// Find every descendant of `root` matched by any pattern in `set`, in
/// lexical order. Symbolic links are reported but never followed.
///
/// # Errors
///
/// Returns an error if `root` or any visited directory cannot be read.
pub fn find_matching(root: &Path, set: &PatternSet) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in walk(root, set) {
        found.push(entry?);
    }
    found.sort();
    Ok(found)
}

/// Breadth-first search below `root` (depth 0) for directories containing at
/// least one match for every pattern in `sub_patterns`.
///
/// Directories deeper than `max_depth` are not examined, and a qualifying
/// directory is not searched further. Results are sorted.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn find_dirs<S: AsRef<str>>(
    root: &Path,
    max_depth: usize,
    sub_patterns: &[S],
) -> io::Result<Vec<PathBuf>> {
    let sets: Vec<PatternSet> = sub_patterns
        .iter()
        .map(|p| PatternSet::from(Pattern::new(p.as_ref())))
        .collect();

    let mut found = Vec::new();
    let mut queue = VecDeque::from([(root.to_path_buf(), 0_usize)]);
    while let Some((dir, depth)) = queue.pop_front() {
        if qualifies(&dir, &sets)? {
            found.push(dir);
            continue;
        }
        if depth < max_depth {
            for child in sorted_child_dirs(&dir)? {
                queue.push_back((child, depth + 1));
            }
        }
    }
    found.sort();
    Ok(found)
}

fn qualifies(dir: &Path, sets: &[PatternSet]) -> io::Result<bool> {
    for set in sets {
        match walk(dir, set).next() {
            Some(Err(e)) => return Err(e),
            Some(Ok(_)) => {}
            None => return Ok(false),
        }
    }
    Ok(true)
}

fn sorted_child_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Depth-first walk below `root` yielding matching paths. Subtrees that no
/// pattern can reach are pruned.
fn walk<'a>(root: &'a Path, set: &'a PatternSet) -> impl Iterator<Item = io::Result<PathBuf>> + 'a {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            let rel = relative_segments(root, entry.path());
            let rel: Vec<&str> = rel.iter().map(String::as_str).collect();
            set.matches_segments(&rel)
                || (entry.file_type().is_dir() && set.may_match_below(&rel))
        })
        .filter_map(move |entry| match entry {
            Err(e) => Some(Err(io::Error::from(e))),
            Ok(entry) => {
                let rel = relative_segments(root, entry.path());
                let rel: Vec<&str> = rel.iter().map(String::as_str).collect();
                set.matches_segments(&rel).then(|| Ok(entry.into_path()))
            }
        })
}

fn relative_segments(root: &Path, path: &Path) -> Vec<String> {
    path.strip_prefix(root)
        .map(segments_of)
        .unwrap_or_default()
}

fn segments_of(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => (0..=path.len())
            .filter_map(|skip| path.get(skip..))
            .any(|tail| match_segments(rest, tail)),
        Some((Segment::Glob(glob), rest)) => path
            .split_first()
            .is_some_and(|(name, tail)| glob_match(glob, name) && match_segments(rest, tail)),
    }
}

/// Whether a path strictly below `path` could still satisfy `pattern`.
fn viable_prefix(pattern: &[Segment], path: &[&str]) -> bool {
    match (path.split_first(), pattern.split_first()) {
        (None, rest) => rest.is_some(),
        (Some(_), None) => false,
        (Some(_), Some((Segment::AnyDepth, _))) => true,
        (Some((name, tail)), Some((Segment::Glob(glob), rest))) => {
            glob_match(glob, name) && viable_prefix(rest, tail)
        }
    }
}

/// Match a single path segment against `*`/`?` wildcards.
fn glob_match(pattern: &[char], name: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some('?') => {
                p += 1;
                n += 1;
            }
            Some(c) if name.get(n) == Some(c) => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    n = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }
    pattern
        .get(p..)
        .is_some_and(|rest| rest.iter().all(|c| *c == '*'))
}

/// Expand every closed `{...}` group into its alternatives.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = first_closed_group(pattern) else {
        return vec![pattern.to_string()];
    };
    let prefix = pattern.get(..open).unwrap_or_default();
    let body = pattern.get(open + 1..close).unwrap_or_default();
    let suffix = pattern.get(close + 1..).unwrap_or_default();

    let mut expanded = Vec::new();
    for alt in split_alternatives(body) {
        for result in expand_braces(&format!("{prefix}{alt}{suffix}")) {
            if !expanded.contains(&result) {
                expanded.push(result);
            }
        }
    }
    expanded
}

/// Byte offsets of the first `{` that has a matching `}`.
fn first_closed_group(pattern: &str) -> Option<(usize, usize)> {
    pattern
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(open, _)| {
            let mut depth = 0_usize;
            for (offset, c) in pattern.get(open..)?.char_indices() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some((open, open + offset));
                        }
                    }
                    _ => {}
                }
            }
            None
        })
}

/// Split a group body at commas that are not nested in inner groups.
fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(body.get(start..i).unwrap_or_default());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body.get(start..).unwrap_or_default());
    parts
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    fn matches(pattern: &str, path: &str) -> bool {
        Pattern::new(pattern).matches(Path::new(path))
    }

    fn tree(paths: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for path in paths {
            let full = dir.path().join(path);
            if path.ends_with('/') {
                fs::create_dir_all(&full).unwrap();
            } else {
                fs::create_dir_all(full.parent().unwrap()).unwrap();
                fs::write(&full, "").unwrap();
            }
        }
        dir
    }

    fn relative(root: &Path, found: &[PathBuf]) -> Vec<String> {
        found
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------------

    #[test]
    fn literal_segments_are_case_sensitive() {
        assert!(matches("bin/app", "bin/app"));
        assert!(!matches("bin/app", "bin/App"));
        assert!(!matches("bin/app", "bin/app/extra"));
    }

    #[test]
    fn star_stays_within_segment() {
        assert!(matches("bin/*", "bin/app"));
        assert!(!matches("bin/*", "bin/sub/app"));
        assert!(matches("etc/*.conf", "etc/app.conf"));
        assert!(!matches("etc/*.conf", "etc/app.conf.bak"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        assert!(matches("bin/app?", "bin/app1"));
        assert!(!matches("bin/app?", "bin/app"));
    }

    #[test]
    fn double_star_spans_segments() {
        assert!(matches("**/*.dll", "lib/x/y/foo.dll"));
        assert!(matches("**/*.dll", "foo.dll"));
        assert!(matches("a/**/b", "a/b"));
        assert!(matches("a/**/b", "a/x/y/b"));
        assert!(matches("a/**", "a"));
        assert!(matches("a/**", "a/x/y"));
        assert!(!matches("a/**/b", "a/x/c"));
    }

    #[test]
    fn braces_expand_to_alternatives() {
        assert!(matches("{bin,lib}/*.so", "lib/a.so"));
        assert!(matches("{bin,lib}/*.so", "bin/a.so"));
        assert!(!matches("{bin,lib}/*.so", "etc/a.so"));
    }

    #[test]
    fn braces_nest_and_hold_wildcards() {
        assert!(matches("**/*.{dll,so{,.1}}", "lib/x.so.1"));
        assert!(matches("**/*.{dll,so{,.1}}", "lib/x.so"));
        assert!(matches("{*.txt,doc/**}", "doc/a/b.md"));
    }

    #[test]
    fn multiple_groups_expand_independently() {
        assert!(matches("{a,b}/{c,d}", "b/c"));
        assert!(!matches("{a,b}/{c,d}", "c/a"));
    }

    #[test]
    fn empty_group_is_empty_alternative() {
        assert!(matches("a{}b", "ab"));
        assert!(!matches("{}", "x"));
        assert!(!matches("dir/{}", "dir/x"));
    }

    #[test]
    fn unclosed_brace_is_literal() {
        assert!(matches("a{b", "a{b"));
        assert!(matches("x{y{1,2}", "x{y2"));
    }

    #[test]
    fn dot_files_are_ordinary_names() {
        assert!(matches("*", ".hidden"));
        assert!(matches("**/*.conf", "etc/.app.conf"));
    }

    #[test]
    fn pattern_set_is_a_union() {
        let set = PatternSet::new(&["bin/*", "lib/*.jar"]);
        assert!(set.matches(Path::new("lib/a.jar")));
        assert!(set.matches(Path::new("bin/tool")));
        assert!(!set.matches(Path::new("etc/a.conf")));
    }

    // -----------------------------------------------------------------------
    // find
    // -----------------------------------------------------------------------

    #[test]
    fn find_returns_sorted_matches() {
        let dir = tree(&["lib/b.dll", "lib/x/a.dll", "a.dll", "keep.txt"]);
        let found = find(dir.path(), "**/*.dll").unwrap();
        assert_eq!(
            relative(dir.path(), &found),
            vec!["a.dll", "lib/b.dll", "lib/x/a.dll"]
        );
    }

    #[test]
    fn find_excludes_root_and_reports_directories() {
        let dir = tree(&["bin/app", "etc/"]);
        let found = find(dir.path(), "*").unwrap();
        assert_eq!(relative(dir.path(), &found), vec!["bin", "etc"]);
    }

    #[test]
    fn find_with_braces() {
        let dir = tree(&["bin/app", "bin/app.exe", "bin/app64.exe", "etc/app.conf"]);
        let found = find(dir.path(), "bin/*.{exe,conf}").unwrap();
        assert_eq!(
            relative(dir.path(), &found),
            vec!["bin/app.exe", "bin/app64.exe"]
        );
    }

    #[test]
    fn find_on_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find(&dir.path().join("missing"), "*").is_err());
    }

    // -----------------------------------------------------------------------
    // find_dirs
    // -----------------------------------------------------------------------

    #[test]
    fn find_dirs_locates_nested_app_root() {
        let dir = tree(&["App-1.0/bin/app", "App-1.0/etc/app.conf", "README"]);
        let found = find_dirs(dir.path(), 5, &["bin/*", "etc/*.conf"]).unwrap();
        assert_eq!(relative(dir.path(), &found), vec!["App-1.0"]);
    }

    #[test]
    fn find_dirs_requires_every_sub_pattern() {
        let dir = tree(&["a/bin/app", "b/etc/app.conf"]);
        let found = find_dirs(dir.path(), 5, &["bin/*", "etc/*.conf"]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn find_dirs_reports_every_candidate() {
        let dir = tree(&[
            "one/bin/app",
            "one/etc/app.conf",
            "two/bin/app",
            "two/etc/app.conf",
        ]);
        let found = find_dirs(dir.path(), 5, &["bin/*", "etc/*.conf"]).unwrap();
        assert_eq!(relative(dir.path(), &found), vec!["one", "two"]);
    }

    #[test]
    fn find_dirs_does_not_descend_into_qualified_dirs() {
        let dir = tree(&["jdk/bin/java", "jdk/jre/bin/java"]);
        let found = find_dirs(dir.path(), 5, &["bin/java*"]).unwrap();
        assert_eq!(relative(dir.path(), &found), vec!["jdk"]);
    }

    #[test]
    fn find_dirs_can_return_the_root() {
        let dir = tree(&["bin/java"]);
        let found = find_dirs(dir.path(), 5, &["bin/java*"]).unwrap();
        assert_eq!(found, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn find_dirs_respects_max_depth() {
        let dir = tree(&["a/b/c/d/e/f/bin/java"]);
        assert!(find_dirs(dir.path(), 5, &["bin/java*"]).unwrap().is_empty());
        assert_eq!(find_dirs(dir.path(), 6, &["bin/java*"]).unwrap().len(), 1);
    }
}
