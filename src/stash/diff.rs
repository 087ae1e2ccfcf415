//! Reading the diff artifacts `svn diff` produces.
//!
//! Artifacts are handled as bytes: file contents inside hunks are not
//! guaranteed to be UTF-8, only the header lines are decoded.

use crate::errors::Result;
use regex::bytes::Regex;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Prefix of the line opening each file section
pub const FILE_INDICATOR: &[u8] = b"Index: ";

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk header regex")
});

/// What a diff section does to its file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Deleted,
    Modified,
    /// No textual hunk (property-only or binary change)
    Unknown,
}

impl FileStatus {
    pub fn code(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Deleted => 'D',
            Self::Modified => 'M',
            Self::Unknown => '?',
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Split a diff into lines without their line terminators
pub(crate) fn lines(diff: &[u8]) -> impl Iterator<Item = &[u8]> {
    diff.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// The path named by a header line starting with `prefix`
pub(crate) fn header_path(line: &[u8], prefix: &[u8]) -> Option<String> {
    let rest = line.strip_prefix(prefix)?;
    let path = String::from_utf8_lossy(rest).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Paths of all files the diff touches, in order of appearance
pub fn files_in_diff(diff: &[u8]) -> Vec<String> {
    let mut seen = HashSet::new();
    lines(diff)
        .filter_map(|line| header_path(line, FILE_INDICATOR))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Paths of all files the diff touches, with the status their first hunk implies
pub fn files_with_status(diff: &[u8]) -> Vec<(FileStatus, String)> {
    let mut files: Vec<(FileStatus, String)> = Vec::new();
    let mut awaiting_hunk = false;

    for line in lines(diff) {
        if let Some(path) = header_path(line, FILE_INDICATOR) {
            if files.iter().any(|(_, known)| *known == path) {
                awaiting_hunk = false;
                continue;
            }
            files.push((FileStatus::Unknown, path));
            awaiting_hunk = true;
        } else if awaiting_hunk {
            if let Some(caps) = HUNK_HEADER.captures(line) {
                let old_empty = is_empty_range(caps.get(1), caps.get(2));
                let new_empty = is_empty_range(caps.get(3), caps.get(4));
                let status = match (old_empty, new_empty) {
                    (true, false) => FileStatus::Added,
                    (false, true) => FileStatus::Deleted,
                    _ => FileStatus::Modified,
                };
                if let Some(last) = files.last_mut() {
                    last.0 = status;
                }
                awaiting_hunk = false;
            }
        }
    }

    files
}

fn is_empty_range(start: Option<regex::bytes::Match<'_>>, count: Option<regex::bytes::Match<'_>>) -> bool {
    let start = start.map(|m| m.as_bytes()) == Some(b"0".as_slice());
    let count = count.map(|m| m.as_bytes()) == Some(b"0".as_slice());
    start && count
}

/// Paths referenced by the artifact at `path`
pub fn read_files(path: &Path) -> Result<Vec<String>> {
    Ok(files_in_diff(&fs::read(path)?))
}
