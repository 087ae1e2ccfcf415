use super::VersionControl;
use crate::errors::{Result, StashError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static LOG_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^r(\d+) \| ([^|]*) \| [^|]* \| (\d+) lines?$").expect("valid log header regex")
});

static CHANGED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+([ADMR]) (.+?)(?: \(from (.+):(\d+)\))?$").expect("valid changed path regex")
});

/// What a commit did to one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Added,
    Deleted,
    Modified,
    /// Deleted and re-added within the same commit
    Replaced,
}

impl ChangeAction {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::Added),
            "D" => Some(Self::Deleted),
            "M" => Some(Self::Modified),
            "R" => Some(Self::Replaced),
            _ => None,
        }
    }
}

/// Origin of a copied (or moved) path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySource {
    pub path: String,
    pub revision: u64,
}

/// One changed-path record of a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathChange {
    pub path: String,
    pub action: ChangeAction,
    pub copy_from: Option<CopySource>,
}

impl PathChange {
    pub fn new(path: impl Into<String>, action: ChangeAction) -> Self {
        Self {
            path: path.into(),
            action,
            copy_from: None,
        }
    }

    pub fn copied_from(mut self, path: impl Into<String>, revision: u64) -> Self {
        self.copy_from = Some(CopySource {
            path: path.into(),
            revision,
        });
        self
    }
}

/// One commit and the paths it touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub revision: u64,
    pub author: String,
    pub changes: Vec<PathChange>,
}

impl RevisionEntry {
    pub fn new(revision: u64, changes: Vec<PathChange>) -> Self {
        Self {
            revision,
            author: String::new(),
            changes,
        }
    }

    /// True iff this commit deleted exactly `path`.
    ///
    /// A move shows up as a deletion of the old path plus a copy at the new
    /// path, so this is also true for the source of a rename.
    pub fn was_deleted(&self, path: &str) -> bool {
        self.changes
            .iter()
            .any(|change| change.action == ChangeAction::Deleted && change.path == path)
    }

    /// The path `path` was copied to in this commit, if any
    pub fn new_path_for(&self, path: &str) -> Option<&str> {
        self.changes.iter().find_map(|change| match &change.copy_from {
            Some(source) if source.path == path => Some(change.path.as_str()),
            _ => None,
        })
    }

    /// Re-express repository paths relative to a working copy checked out
    /// from `prefix` (e.g. `/trunk`).
    ///
    /// Changes outside the working copy are dropped; a copy whose source lies
    /// outside it loses its copy source.
    pub fn relative_to(self, prefix: &str) -> Self {
        let changes = self
            .changes
            .into_iter()
            .filter_map(|change| {
                let path = strip_repo_prefix(prefix, &change.path)?;
                let copy_from = change.copy_from.and_then(|source| {
                    strip_repo_prefix(prefix, &source.path).map(|path| CopySource {
                        path,
                        revision: source.revision,
                    })
                });
                Some(PathChange {
                    path,
                    action: change.action,
                    copy_from,
                })
            })
            .collect();

        Self {
            revision: self.revision,
            author: self.author,
            changes,
        }
    }
}

/// Where a path captured in a stash lives now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    /// Renamed (possibly several times) to this path
    Moved(String),
    /// Deleted upstream; nothing may be written for it
    Deleted,
}

/// Ordered commits between a stash's revision and the working copy's
#[derive(Debug, Clone, Default)]
pub struct RevisionHistory {
    entries: Vec<RevisionEntry>,
}

impl RevisionHistory {
    pub fn new(mut entries: Vec<RevisionEntry>) -> Self {
        entries.sort_by_key(|entry| entry.revision);
        Self { entries }
    }

    /// Query commits `start+1..=end` for `scope`
    pub fn fetch(vcs: &dyn VersionControl, scope: &str, start: u64, end: u64) -> Result<Self> {
        if end <= start {
            return Ok(Self::default());
        }

        debug!("Fetching history of {} for r{}:r{}", scope, start + 1, end);
        let entries = vcs.log(scope, start + 1, end).map_err(|e| match e {
            StashError::HistoryUnavailable(_) | StashError::MissingExternalTool(_) => e,
            other => StashError::history(other.to_string()),
        })?;

        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[RevisionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Follow `path` through every commit, oldest first.
    ///
    /// Renames are chained through the current alias. When the current alias
    /// is deleted, `confirm` decides between aborting with `UserAborted` and
    /// marking the path as gone, which ends the walk for it. Returns `None`
    /// when the path ends up where it started.
    pub fn resolve(
        &self,
        path: &str,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<Option<PathTarget>> {
        let mut current = path.to_string();

        for entry in &self.entries {
            if let Some(new_path) = entry.new_path_for(&current) {
                debug!("r{}: {} moved to {}", entry.revision, current, new_path);
                current = new_path.to_string();
            } else if entry.was_deleted(&current) {
                debug!("r{}: {} deleted", entry.revision, current);
                let prompt = if current == path {
                    format!("Warning: the file \"{path}\" in the stash has been deleted. Continue?")
                } else {
                    format!(
                        "Warning: the file \"{path}\" in the stash (last known as \"{current}\") has been deleted. Continue?"
                    )
                };
                if !confirm(&prompt) {
                    return Err(StashError::UserAborted);
                }
                return Ok(Some(PathTarget::Deleted));
            }
        }

        if current == path {
            Ok(None)
        } else {
            Ok(Some(PathTarget::Moved(current)))
        }
    }
}

fn strip_repo_prefix(prefix: &str, repo_path: &str) -> Option<String> {
    let prefix = prefix.trim_end_matches('/');
    let rest = repo_path.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some(".".to_string());
    }
    let rest = rest.strip_prefix('/')?;
    Some(rest.to_string())
}

/// Parse the plain-text output of `svn log -v`.
///
/// Message bodies are skipped by the line count in each header, so a
/// message that looks like a log record is never mistaken for one.
pub fn parse_log(output: &str) -> Result<Vec<RevisionEntry>> {
    let lines: Vec<&str> = output.lines().map(|l| l.trim_end_matches('\r')).collect();
    let mut entries = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = LOG_HEADER.captures(lines[i]) else {
            i += 1;
            continue;
        };

        let revision: u64 = caps[1]
            .parse()
            .map_err(|_| StashError::history(format!("bad revision in log: {}", lines[i])))?;
        let author = caps[2].trim().to_string();
        let message_lines: usize = caps[3]
            .parse()
            .map_err(|_| StashError::history(format!("bad line count in log: {}", lines[i])))?;
        i += 1;

        let mut changes = Vec::new();
        if lines.get(i) == Some(&"Changed paths:") {
            i += 1;
            while let Some(line) = lines.get(i) {
                if line.is_empty() {
                    break;
                }
                changes.push(parse_changed_path(line)?);
                i += 1;
            }
        }

        if lines.get(i).is_some_and(|line| line.is_empty()) {
            i += 1;
        }
        i += message_lines;

        entries.push(RevisionEntry {
            revision,
            author,
            changes,
        });
    }

    Ok(entries)
}

fn parse_changed_path(line: &str) -> Result<PathChange> {
    let caps = CHANGED_PATH
        .captures(line)
        .ok_or_else(|| StashError::history(format!("unrecognised changed path: {line}")))?;

    let action = ChangeAction::from_code(&caps[1])
        .ok_or_else(|| StashError::history(format!("unknown action in: {line}")))?;
    let mut change = PathChange::new(&caps[2], action);

    if let (Some(source), Some(revision)) = (caps.get(3), caps.get(4)) {
        let revision = revision
            .as_str()
            .parse()
            .map_err(|_| StashError::history(format!("bad copy revision in: {line}")))?;
        change = change.copied_from(source.as_str(), revision);
    }

    Ok(change)
}
