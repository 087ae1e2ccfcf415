//! Subversion integration
//!
//! This module holds everything svnstash knows about the working copy:
//! - locating the working-copy root and the command scope
//! - the `VersionControl` seam the stash engine talks through
//! - the subprocess-backed `SvnClient`
//! - revision history with rename/delete facts

pub mod client;
pub mod history;

pub use client::SvnClient;
pub use history::{ChangeAction, CopySource, PathChange, PathTarget, RevisionEntry, RevisionHistory};

use crate::errors::{Result, StashError};
use crate::utils::to_scope_string;
use std::path::{Path, PathBuf};

/// Name of the administrative directory marking a working-copy root
pub const ADMIN_DIR: &str = ".svn";

/// Working-copy status of one path, as reported by `svn status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Deleted,
    Modified,
    /// Only the properties changed (blank first column, `M` in the second)
    PropertyModified,
    Replaced,
    Conflicted,
    Missing,
    Obstructed,
    Unversioned,
    Ignored,
    External,
}

impl ChangeStatus {
    /// Parse the first column of an `svn status` line
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'A' => Some(Self::Added),
            'D' => Some(Self::Deleted),
            'M' => Some(Self::Modified),
            'R' => Some(Self::Replaced),
            'C' => Some(Self::Conflicted),
            '!' => Some(Self::Missing),
            '~' => Some(Self::Obstructed),
            '?' => Some(Self::Unversioned),
            'I' => Some(Self::Ignored),
            'X' => Some(Self::External),
            _ => None,
        }
    }

    /// Parse the second (property) column of a line whose first column is blank
    pub fn from_property_code(code: char) -> Option<Self> {
        match code {
            'M' => Some(Self::PropertyModified),
            'C' => Some(Self::Conflicted),
            _ => None,
        }
    }

    /// Whether this status is a local edit that a stash captures
    pub fn is_local_change(self) -> bool {
        !matches!(self, Self::Unversioned | Self::Ignored | Self::External)
    }
}

/// One line of `svn status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub status: ChangeStatus,
    pub path: String,
}

impl StatusEntry {
    pub fn new(status: ChangeStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
        }
    }
}

/// Operations svnstash needs from the version-control client.
///
/// Paths are relative to the working-copy root and use `/` separators.
pub trait VersionControl {
    /// Local changes under `scope`
    fn status(&self, scope: &str) -> Result<Vec<StatusEntry>>;

    /// Unified diff of the local changes under `scope`
    fn diff(&self, scope: &str) -> Result<Vec<u8>>;

    /// Schedule `path` for addition; already versioned paths are accepted
    fn add(&self, path: &str) -> Result<()>;

    /// Schedule `path` for deletion, removing it from disk
    fn remove(&self, path: &str) -> Result<()>;

    /// Recursively discard local changes under `path`
    fn revert(&self, path: &str) -> Result<()>;

    /// Bring `path` up to date with the repository
    fn update(&self, path: &str) -> Result<()>;

    /// Commits `from..=to` touching `scope`, oldest first
    fn log(&self, scope: &str, from: u64, to: u64) -> Result<Vec<RevisionEntry>>;

    /// Revision the working copy under `scope` is at
    fn local_revision(&self, scope: &str) -> Result<u64>;
}

/// A working copy located from some directory inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    /// Directory holding the `.svn` administrative area
    pub root: PathBuf,
    /// The starting directory relative to `root` (`.` for the root itself)
    pub scope: String,
}

impl WorkingCopy {
    /// Walk upward from `start` to the nearest directory containing `.svn`
    pub fn discover(start: &Path) -> Result<Self> {
        let start = start
            .canonicalize()
            .map_err(|_| StashError::RootNotFound(start.display().to_string()))?;

        let root = start
            .ancestors()
            .find(|dir| dir.join(ADMIN_DIR).is_dir())
            .ok_or_else(|| StashError::RootNotFound(start.display().to_string()))?
            .to_path_buf();

        let scope = start
            .strip_prefix(&root)
            .map(to_scope_string)
            .unwrap_or_else(|_| ".".to_string());

        Ok(Self { root, scope })
    }

    /// Discover from the process's current directory
    pub fn current() -> Result<Self> {
        let current_dir = std::env::current_dir()
            .map_err(|e| StashError::config(format!("Could not get current directory: {e}")))?;
        Self::discover(&current_dir)
    }

    /// The administrative directory of this working copy
    pub fn admin_dir(&self) -> PathBuf {
        self.root.join(ADMIN_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_from_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".svn")).unwrap();

        let wc = WorkingCopy::discover(tmp.path()).unwrap();
        assert_eq!(wc.root, tmp.path().canonicalize().unwrap());
        assert_eq!(wc.scope, ".");
    }

    #[test]
    fn test_discover_from_nested_directory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".svn")).unwrap();
        let nested = tmp.path().join("src").join("lib");
        fs::create_dir_all(&nested).unwrap();

        let wc = WorkingCopy::discover(&nested).unwrap();
        assert_eq!(wc.root, tmp.path().canonicalize().unwrap());
        assert_eq!(wc.scope, "src/lib");
    }

    #[test]
    fn test_discover_outside_working_copy() {
        let tmp = TempDir::new().unwrap();
        let result = WorkingCopy::discover(tmp.path());
        assert!(matches!(result, Err(StashError::RootNotFound(_))));
    }

    #[test]
    fn test_admin_file_is_not_a_root_marker() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".svn"), "not a directory").unwrap();
        assert!(WorkingCopy::discover(tmp.path()).is_err());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ChangeStatus::from_code('M'), Some(ChangeStatus::Modified));
        assert_eq!(ChangeStatus::from_code('?'), Some(ChangeStatus::Unversioned));
        assert_eq!(ChangeStatus::from_code(' '), None);
        assert_eq!(
            ChangeStatus::from_property_code('M'),
            Some(ChangeStatus::PropertyModified)
        );
        assert!(ChangeStatus::PropertyModified.is_local_change());
        assert!(ChangeStatus::Added.is_local_change());
        assert!(ChangeStatus::Missing.is_local_change());
        assert!(!ChangeStatus::Unversioned.is_local_change());
        assert!(!ChangeStatus::External.is_local_change());
    }
}
