use super::diff::FileStatus;
use super::stash::{ApplyOptions, ApplyReport, Stash, StashContext};
use crate::config::Settings;
use crate::errors::{Result, StashError};
use crate::patch::{GnuPatch, PatchTool};
use crate::svn::{SvnClient, VersionControl, WorkingCopy};
use crate::utils::atomic_file;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// All stashes of one working copy, most recent first.
///
/// The whole collection is loaded when the store is opened and written back
/// by `persist`, once per command. Two processes working on the same working
/// copy at the same time are not coordinated; the last `persist` wins.
pub struct StashStore {
    working_copy: WorkingCopy,
    stash_dir: PathBuf,
    data_file: PathBuf,
    stashes: Vec<Stash>,
    vcs: Box<dyn VersionControl>,
    patcher: Box<dyn PatchTool>,
    options: ApplyOptions,
}

impl StashStore {
    /// Directory under `.svn` holding the index and the artifacts
    pub const STASH_DIR: &'static str = "stash";
    /// Serialized collection inside the stash directory
    pub const DATA_FILE: &'static str = "stashes.json";

    /// Open the store of the working copy containing `start`, talking to
    /// the real `svn` and `patch` executables
    pub fn open(start: &Path, settings: &Settings) -> Result<Self> {
        let working_copy = WorkingCopy::discover(start)?;
        let vcs = SvnClient::new(&working_copy.root, &settings.tools);
        let patcher = GnuPatch::new(settings.tools.patch.clone());

        Self::new(
            working_copy,
            Box::new(vcs),
            Box::new(patcher),
            ApplyOptions::from(&settings.stash),
        )
    }

    /// Open the store of `working_copy` with explicit collaborators
    pub fn new(
        working_copy: WorkingCopy,
        vcs: Box<dyn VersionControl>,
        patcher: Box<dyn PatchTool>,
        options: ApplyOptions,
    ) -> Result<Self> {
        let stash_dir = working_copy.admin_dir().join(Self::STASH_DIR);
        let data_file = stash_dir.join(Self::DATA_FILE);

        if !stash_dir.is_dir() {
            fs::create_dir_all(&stash_dir)
                .map_err(|e| StashError::storage(format!("{}: {e}", stash_dir.display())))?;
        }

        let mut store = Self {
            working_copy,
            stash_dir,
            data_file,
            stashes: Vec::new(),
            vcs,
            patcher,
            options,
        };
        store.load_from_disk()?;

        Ok(store)
    }

    fn load_from_disk(&mut self) -> Result<()> {
        if self.data_file.exists() {
            let content = fs::read_to_string(&self.data_file)
                .map_err(|e| StashError::config(format!("Failed to read stash index: {e}")))?;

            self.stashes = serde_json::from_str(&content)
                .map_err(|e| StashError::config(format!("Failed to parse stash index: {e}")))?;
        }
        debug!("Loaded {} stash(es) from {}", self.stashes.len(), self.data_file.display());
        Ok(())
    }

    /// Write the whole collection back to disk
    pub fn persist(&self) -> Result<()> {
        atomic_file::write_json(&self.data_file, &self.stashes)
    }

    pub fn working_copy(&self) -> &WorkingCopy {
        &self.working_copy
    }

    pub fn stash_dir(&self) -> &Path {
        &self.stash_dir
    }

    pub fn len(&self) -> usize {
        self.stashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stashes.is_empty()
    }

    /// All stashes, most recent first
    pub fn list(&self) -> &[Stash] {
        &self.stashes
    }

    fn resolve_index(&self, index: i64) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.stashes.len())
            .ok_or_else(|| StashError::index_out_of_range(index, self.stashes.len()))
    }

    pub fn get(&self, index: i64) -> Result<&Stash> {
        let i = self.resolve_index(index)?;
        Ok(&self.stashes[i])
    }

    pub fn insert_front(&mut self, stash: Stash) {
        self.stashes.insert(0, stash);
    }

    fn context(&self) -> StashContext<'_> {
        StashContext {
            root: &self.working_copy.root,
            stash_dir: &self.stash_dir,
            vcs: self.vcs.as_ref(),
            patcher: self.patcher.as_ref(),
            options: &self.options,
        }
    }

    /// Stash the changes under the current scope, keeping them in place
    pub fn save(&mut self, comment: &str) -> Result<&Stash> {
        let stash = Stash::capture(&self.context(), &self.working_copy.scope, comment)?;
        self.insert_front(stash);
        Ok(&self.stashes[0])
    }

    /// Stash the changes under the current scope and revert them
    pub fn push(&mut self, comment: &str) -> Result<&Stash> {
        self.save(comment)?;
        self.stashes[0].revert(&self.context())?;
        Ok(&self.stashes[0])
    }

    /// Apply stash `index`, keeping it
    pub fn apply(
        &mut self,
        index: i64,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ApplyReport> {
        let i = self.resolve_index(index)?;
        let ctx = StashContext {
            root: &self.working_copy.root,
            stash_dir: &self.stash_dir,
            vcs: self.vcs.as_ref(),
            patcher: self.patcher.as_ref(),
            options: &self.options,
        };
        self.stashes[i].apply(&ctx, confirm)
    }

    /// Apply stash `index` and remove it, whatever hunks were rejected
    pub fn pop(
        &mut self,
        index: i64,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ApplyReport> {
        let report = self.apply(index, confirm)?;
        self.remove(index)?;
        Ok(report)
    }

    /// Delete stash `index` and its artifact without applying it
    pub fn remove(&mut self, index: i64) -> Result<Stash> {
        let i = self.resolve_index(index)?;
        self.stashes[i].delete(&self.stash_dir)?;
        let stash = self.stashes.remove(i);
        info!("Removed stash {}", stash.id);
        Ok(stash)
    }

    /// Raw artifact of stash `index`
    pub fn artifact(&self, index: i64) -> Result<Vec<u8>> {
        self.get(index)?.read_artifact(&self.stash_dir)
    }

    /// Files touched by stash `index`, with status
    pub fn files(&self, index: i64) -> Result<Vec<(FileStatus, String)>> {
        self.get(index)?.files_with_status(&self.stash_dir)
    }
}
