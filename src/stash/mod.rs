//! Stash management module
//!
//! This module implements the stash engine:
//! - Stash records and their diff artifacts
//! - The persisted, index-addressed stash collection
//! - Rebasing artifacts across upstream renames and deletions
//! - Reading the file list out of an artifact

pub mod diff;
pub mod rebase;
pub mod stash;
pub mod store;

pub use diff::FileStatus;
pub use rebase::{DiffRebaser, RenameMap};
pub use stash::{ApplyOptions, ApplyReport, Stash, StashContext};
pub use store::StashStore;
