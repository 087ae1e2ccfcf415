use super::diff::{self, FileStatus};
use super::rebase::{is_deleted_marker, DiffRebaser, RenameMap};
use crate::config::StashSettings;
use crate::errors::{Result, StashError};
use crate::patch::PatchTool;
use crate::svn::{ChangeStatus, RevisionHistory, VersionControl};
use crate::utils::spinner::Spinner;
use crate::utils::{atomic_file, human_readable_size};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Knobs for `apply`, usually taken from the user settings
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Run `svn update` on the scope before computing the target revision
    pub update_first: bool,
    /// Revision gap at which history retrieval is announced as slow
    pub large_range_warning: u64,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self::from(&StashSettings::default())
    }
}

impl From<&StashSettings> for ApplyOptions {
    fn from(settings: &StashSettings) -> Self {
        Self {
            update_first: settings.update_before_apply,
            large_range_warning: settings.large_range_warning,
        }
    }
}

/// Everything a stash needs from its surroundings
pub struct StashContext<'a> {
    /// Working-copy root; every path in the artifact is relative to it
    pub root: &'a Path,
    /// Directory holding the diff artifacts
    pub stash_dir: &'a Path,
    pub vcs: &'a dyn VersionControl,
    pub patcher: &'a dyn PatchTool,
    pub options: &'a ApplyOptions,
}

/// Outcome of applying a stash
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// Revision the stash was captured against before this apply
    pub previous_revision: u64,
    /// Revision the stash is captured against now
    pub revision: u64,
    /// Paths rewritten by the rebase
    pub renames: RenameMap,
    /// Paths registered with `svn add`
    pub registered: Vec<String>,
    /// Empty paths removed with `svn remove`
    pub deregistered: Vec<String>,
    /// Reject files the patch tool left behind
    pub rejects: Vec<String>,
    /// Bookkeeping problems that did not stop the apply
    pub warnings: Vec<String>,
}

impl ApplyReport {
    pub fn rebased(&self) -> bool {
        self.previous_revision != self.revision
    }
}

/// A saved snapshot of uncommitted edits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stash {
    /// Unique identifier; also names the diff artifact
    pub id: Uuid,
    /// Path under the working-copy root the stash covers (`.` for the root)
    pub scope: String,
    /// Free-text comment given at save time
    pub comment: String,
    /// When the stash was saved
    pub created_at: DateTime<Utc>,
    /// Revision the artifact's paths are consistent with
    pub revision: u64,
    /// Human-readable artifact size
    pub size: String,
}

impl Stash {
    /// Snapshot the local changes under `scope` into a new artifact
    pub fn capture(ctx: &StashContext<'_>, scope: &str, comment: &str) -> Result<Self> {
        let changes = ctx.vcs.status(scope)?;
        if !changes.iter().any(|entry| entry.status.is_local_change()) {
            return Err(StashError::NoChangesToStash);
        }

        let revision = ctx.vcs.local_revision(scope)?;
        let diff = ctx.vcs.diff(scope)?;

        let stash = Self {
            id: Uuid::new_v4(),
            scope: scope.to_string(),
            comment: comment.trim().to_string(),
            created_at: Utc::now(),
            revision,
            size: human_readable_size(diff.len() as u64),
        };

        atomic_file::write_bytes(&stash.artifact_path(ctx.stash_dir), &diff)?;
        info!("Saved stash {} of {} at r{}", stash.id, stash.display_scope(), revision);

        Ok(stash)
    }

    /// File name of the artifact for a stash id
    pub fn artifact_file_name(id: &Uuid) -> String {
        format!("{id}.diff")
    }

    /// The artifact owned by this stash
    pub fn artifact_path(&self, stash_dir: &Path) -> PathBuf {
        stash_dir.join(Self::artifact_file_name(&self.id))
    }

    pub fn display_scope(&self) -> &str {
        if self.scope == "." {
            "<root>"
        } else {
            &self.scope
        }
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        let created = self
            .created_at
            .with_timezone(&Local)
            .format("%a %b %e %H:%M:%S %Y");
        if self.comment.is_empty() {
            format!("{} | {} | {}", self.size, created, self.display_scope())
        } else {
            format!(
                "{} | {} | {} - {}",
                self.size,
                created,
                self.display_scope(),
                self.comment
            )
        }
    }

    /// Raw bytes of the artifact
    pub fn read_artifact(&self, stash_dir: &Path) -> Result<Vec<u8>> {
        let path = self.artifact_path(stash_dir);
        fs::read(&path).map_err(|e| artifact_error(&path, e))
    }

    /// Files the artifact touches
    pub fn files(&self, stash_dir: &Path) -> Result<Vec<String>> {
        Ok(diff::files_in_diff(&self.read_artifact(stash_dir)?))
    }

    /// Files the artifact touches, with what it does to each
    pub fn files_with_status(&self, stash_dir: &Path) -> Result<Vec<(FileStatus, String)>> {
        Ok(diff::files_with_status(&self.read_artifact(stash_dir)?))
    }

    /// Discard the local changes this stash captured
    pub fn revert(&self, ctx: &StashContext<'_>) -> Result<()> {
        for entry in ctx.vcs.status(&self.scope)? {
            // a removed directory may already have taken added children with it
            if entry.status == ChangeStatus::Added && ctx.root.join(&entry.path).exists() {
                ctx.vcs.remove(&entry.path)?;
            }
        }
        ctx.vcs.revert(&self.scope)?;
        debug!("Reverted {}", self.display_scope());
        Ok(())
    }

    /// Rewrite the artifact so its paths match `target`.
    ///
    /// On success the stash is captured against `target`; on failure neither
    /// the artifact nor the revision changed.
    pub fn rebase(
        &mut self,
        ctx: &StashContext<'_>,
        target: u64,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<RenameMap> {
        if target == self.revision {
            return Ok(RenameMap::new());
        }

        let gap = target.saturating_sub(self.revision);
        let history = if gap >= ctx.options.large_range_warning {
            warn!("Rebasing across {} revisions, this operation might take a while", gap);
            let spinner = Spinner::new(format!("Reading r{}:r{} history", self.revision + 1, target));
            let history = RevisionHistory::fetch(ctx.vcs, &self.scope, self.revision, target);
            spinner.stop();
            history?
        } else {
            RevisionHistory::fetch(ctx.vcs, &self.scope, self.revision, target)?
        };
        debug!("{} commit(s) between r{} and r{}", history.len(), self.revision, target);

        let renames =
            DiffRebaser::new(&history).rebase(&self.artifact_path(ctx.stash_dir), confirm)?;
        self.revision = target;

        Ok(renames)
    }

    /// Apply the stash to its scope without deleting it
    pub fn apply(
        &mut self,
        ctx: &StashContext<'_>,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ApplyReport> {
        let changes = ctx.vcs.status(&self.scope)?;
        if changes.iter().any(|entry| entry.status.is_local_change()) {
            return Err(StashError::DirtyWorkingCopy(self.scope.clone()));
        }

        if !ctx.patcher.is_available() {
            return Err(StashError::missing_tool(ctx.patcher.name()));
        }

        let artifact = self.artifact_path(ctx.stash_dir);
        if !artifact.is_file() {
            return Err(artifact_error(
                &artifact,
                io::Error::new(io::ErrorKind::NotFound, "artifact missing"),
            ));
        }

        // history tracing needs a working copy at a single, current revision
        if ctx.options.update_first {
            ctx.vcs.update(&self.scope)?;
        }
        let target = ctx.vcs.local_revision(&self.scope)?;

        let mut report = ApplyReport {
            previous_revision: self.revision,
            ..ApplyReport::default()
        };
        report.renames = self.rebase(ctx, target, confirm)?;
        report.revision = self.revision;

        ctx.patcher.apply(ctx.root, &artifact)?;
        self.reconcile(ctx, &artifact, &mut report)?;

        info!("Applied stash {} to {}", self.id, self.display_scope());
        Ok(report)
    }

    /// Register what the patch created and deregister what it emptied
    fn reconcile(
        &self,
        ctx: &StashContext<'_>,
        artifact: &Path,
        report: &mut ApplyReport,
    ) -> Result<()> {
        for file in diff::read_files(artifact)? {
            if is_deleted_marker(&file) {
                continue;
            }

            let reject = format!("{file}.rej");
            if ctx.root.join(&reject).exists() {
                report.rejects.push(reject);
            }

            let Ok(metadata) = fs::metadata(ctx.root.join(&file)) else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            if metadata.len() == 0 {
                match ctx.vcs.remove(&file) {
                    Ok(()) => report.deregistered.push(file),
                    Err(e) => {
                        warn!("Could not remove {} from version control: {}", file, e);
                        report.warnings.push(format!("{file}: {e}"));
                    }
                }
            } else {
                match ctx.vcs.add(&file) {
                    Ok(()) => report.registered.push(file),
                    Err(e) => {
                        warn!("Could not add {} to version control: {}", file, e);
                        report.warnings.push(format!("{file}: {e}"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Delete the artifact; a missing artifact is not an error
    pub fn delete(&self, stash_dir: &Path) -> Result<()> {
        match fs::remove_file(self.artifact_path(stash_dir)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn artifact_error(path: &Path, e: io::Error) -> StashError {
    StashError::Io(io::Error::new(
        e.kind(),
        format!("stash artifact {}: {e}", path.display()),
    ))
}
