//! Stash lifecycle against in-memory svn and patch stand-ins: save, push,
//! apply, pop and remove, including rebases across upstream renames and
//! deletions.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use svnstash::errors::{Result, StashError};
use svnstash::patch::PatchTool;
use svnstash::stash::diff::files_in_diff;
use svnstash::stash::rebase::DELETED_PATH_PREFIX;
use svnstash::stash::{ApplyOptions, StashStore};
use svnstash::svn::{
    ChangeAction, ChangeStatus, PathChange, PathTarget, RevisionEntry, StatusEntry,
    VersionControl, WorkingCopy,
};
use svnstash::utils::atomic_file;
use tempfile::TempDir;

const DIFF: &str = "\
Index: a.txt
===================================================================
--- a.txt\t(revision 3)
+++ a.txt\t(working copy)
@@ -1 +1 @@
-old
+new
";

#[derive(Default)]
struct VcsState {
    status: Vec<StatusEntry>,
    diff: Vec<u8>,
    revision: u64,
    log: Vec<RevisionEntry>,
    fail_log: bool,
    fail_add: bool,
    calls: Vec<String>,
}

#[derive(Clone)]
struct FakeVcs(Rc<RefCell<VcsState>>);

impl VersionControl for FakeVcs {
    fn status(&self, _: &str) -> Result<Vec<StatusEntry>> {
        Ok(self.0.borrow().status.clone())
    }

    fn diff(&self, _: &str) -> Result<Vec<u8>> {
        Ok(self.0.borrow().diff.clone())
    }

    fn add(&self, path: &str) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.calls.push(format!("add {path}"));
        if state.fail_add {
            return Err(StashError::svn("E155010: not a working copy"));
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("remove {path}"));
        Ok(())
    }

    fn revert(&self, path: &str) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("revert {path}"));
        Ok(())
    }

    fn update(&self, path: &str) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("update {path}"));
        Ok(())
    }

    fn log(&self, _: &str, from: u64, to: u64) -> Result<Vec<RevisionEntry>> {
        let mut state = self.0.borrow_mut();
        state.calls.push(format!("log {from}:{to}"));
        if state.fail_log {
            return Err(StashError::svn("E170013: Unable to connect to a repository"));
        }
        Ok(state
            .log
            .iter()
            .filter(|entry| (from..=to).contains(&entry.revision))
            .cloned()
            .collect())
    }

    fn local_revision(&self, _: &str) -> Result<u64> {
        Ok(self.0.borrow().revision)
    }
}

#[derive(Default)]
struct PatchState {
    available: bool,
    applied: Vec<Vec<u8>>,
    /// Extra files to leave behind, relative to the root
    leave: Vec<(String, Vec<u8>)>,
}

/// Writes one line into every file the artifact names, like a clean patch run
#[derive(Clone)]
struct FakePatch(Rc<RefCell<PatchState>>);

impl PatchTool for FakePatch {
    fn is_available(&self) -> bool {
        self.0.borrow().available
    }

    fn apply(&self, root: &Path, artifact: &Path) -> Result<()> {
        let bytes = fs::read(artifact)?;
        for file in files_in_diff(&bytes) {
            if file.starts_with('/') {
                continue;
            }
            let target = root.join(&file);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, "new\n")?;
        }

        let mut state = self.0.borrow_mut();
        for (path, content) in &state.leave {
            fs::write(root.join(path), content)?;
        }
        state.applied.push(bytes);
        Ok(())
    }

    fn name(&self) -> &str {
        "fakepatch"
    }
}

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    vcs: Rc<RefCell<VcsState>>,
    patch: Rc<RefCell<PatchState>>,
    store: StashStore,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".svn")).unwrap();
        let working_copy = WorkingCopy::discover(dir.path()).unwrap();
        let root = working_copy.root.clone();

        let vcs = Rc::new(RefCell::new(VcsState {
            status: vec![StatusEntry::new(ChangeStatus::Modified, "a.txt")],
            diff: DIFF.as_bytes().to_vec(),
            revision: 3,
            ..VcsState::default()
        }));
        let patch = Rc::new(RefCell::new(PatchState {
            available: true,
            ..PatchState::default()
        }));

        let store = StashStore::new(
            working_copy,
            Box::new(FakeVcs(vcs.clone())),
            Box::new(FakePatch(patch.clone())),
            ApplyOptions::default(),
        )
        .unwrap();

        Self {
            _dir: dir,
            root,
            vcs,
            patch,
            store,
        }
    }

    /// Save a stash, then make the working copy clean
    fn saved(comment: &str) -> Self {
        let mut fixture = Self::new();
        fixture.store.save(comment).unwrap();
        fixture.vcs.borrow_mut().status.clear();
        fixture
    }

    fn artifact_path(&self) -> PathBuf {
        self.store.list()[0].artifact_path(self.store.stash_dir())
    }

    fn artifact(&self) -> Vec<u8> {
        fs::read(self.artifact_path()).unwrap()
    }

    fn artifact_count(&self) -> usize {
        fs::read_dir(self.store.stash_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "diff"))
            .count()
    }

    fn upstream(&self, entries: Vec<RevisionEntry>, revision: u64) {
        let mut vcs = self.vcs.borrow_mut();
        vcs.log = entries;
        vcs.revision = revision;
    }
}

fn accept(_: &str) -> bool {
    true
}

fn rename_at(revision: u64, from: &str, to: &str) -> RevisionEntry {
    RevisionEntry::new(
        revision,
        vec![
            PathChange::new(from, ChangeAction::Deleted),
            PathChange::new(to, ChangeAction::Added).copied_from(from, revision - 1),
        ],
    )
}

#[test]
fn test_save_creates_exactly_one_artifact() {
    let mut fx = Fixture::new();
    let stash = fx.store.save("  work in progress ").unwrap().clone();

    assert_eq!(stash.revision, 3);
    assert_eq!(stash.comment, "work in progress");
    assert_eq!(stash.scope, ".");
    assert_eq!(fx.artifact_count(), 1);
    assert_eq!(fx.artifact(), DIFF.as_bytes());
    assert!(fx.artifact_path().ends_with(format!("{}.diff", stash.id)));
    // save keeps the changes in place
    assert!(!fx.vcs.borrow().calls.iter().any(|c| c.starts_with("revert")));
}

#[test]
fn test_save_without_local_changes() {
    let mut fx = Fixture::new();
    fx.vcs.borrow_mut().status = vec![
        StatusEntry::new(ChangeStatus::Unversioned, "scratch.txt"),
        StatusEntry::new(ChangeStatus::Ignored, "build"),
    ];

    assert!(matches!(fx.store.save(""), Err(StashError::NoChangesToStash)));
    assert!(fx.store.is_empty());
    assert_eq!(fx.artifact_count(), 0);
}

#[test]
fn test_push_reverts_and_removes_added_files() {
    let mut fx = Fixture::new();
    fs::write(fx.root.join("fresh.txt"), "hello\n").unwrap();
    fx.vcs.borrow_mut().status = vec![
        StatusEntry::new(ChangeStatus::Modified, "a.txt"),
        StatusEntry::new(ChangeStatus::Added, "fresh.txt"),
        StatusEntry::new(ChangeStatus::Added, "already/gone.txt"),
    ];

    fx.store.push("").unwrap();

    assert_eq!(fx.store.len(), 1);
    assert_eq!(
        fx.vcs.borrow().calls,
        vec!["remove fresh.txt".to_string(), "revert .".to_string()]
    );
}

#[test]
fn test_most_recent_first() {
    let mut fx = Fixture::new();
    fx.store.save("first").unwrap();
    fx.store.save("second").unwrap();

    assert_eq!(fx.store.get(0).unwrap().comment, "second");
    assert_eq!(fx.store.get(1).unwrap().comment, "first");
    assert_eq!(fx.artifact_count(), 2);
}

#[test]
fn test_out_of_range_indices_mutate_nothing() {
    let mut fx = Fixture::saved("only");
    let before = fx.artifact();
    let mut confirm = accept;

    for index in [-1, 1, 7] {
        assert!(matches!(
            fx.store.apply(index, &mut confirm),
            Err(StashError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            fx.store.pop(index, &mut confirm),
            Err(StashError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            fx.store.remove(index),
            Err(StashError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            fx.store.artifact(index),
            Err(StashError::IndexOutOfRange { .. })
        ));
    }

    assert_eq!(fx.store.len(), 1);
    assert_eq!(fx.artifact(), before);
    assert!(fx.patch.borrow().applied.is_empty());
    assert!(fx.vcs.borrow().calls.is_empty());
}

#[test]
fn test_apply_without_upstream_changes() {
    let mut fx = Fixture::saved("");
    let mut confirm = accept;

    let report = fx.store.apply(0, &mut confirm).unwrap();

    assert!(!report.rebased());
    assert!(report.renames.is_empty());
    assert_eq!(report.registered, vec!["a.txt".to_string()]);
    assert_eq!(fx.store.len(), 1);
    assert_eq!(fx.patch.borrow().applied, vec![DIFF.as_bytes().to_vec()]);

    let calls = fx.vcs.borrow().calls.clone();
    assert_eq!(calls, vec!["update .".to_string(), "add a.txt".to_string()]);
}

#[test]
fn test_apply_follows_upstream_rename() {
    let mut fx = Fixture::saved("");
    fx.upstream(vec![rename_at(4, "a.txt", "renamed.txt")], 4);
    let mut prompts = 0;
    let mut confirm = |_: &str| {
        prompts += 1;
        true
    };

    let report = fx.store.apply(0, &mut confirm).unwrap();

    assert_eq!(prompts, 0);
    assert!(report.rebased());
    assert_eq!(report.previous_revision, 3);
    assert_eq!(report.revision, 4);
    assert_eq!(
        report.renames.get("a.txt"),
        Some(&PathTarget::Moved("renamed.txt".to_string()))
    );
    assert_eq!(fx.store.get(0).unwrap().revision, 4);

    let artifact = String::from_utf8(fx.artifact()).unwrap();
    assert!(artifact.contains("Index: renamed.txt\n"));
    assert!(!artifact.contains("Index: a.txt"));

    assert!(fx.root.join("renamed.txt").is_file());
    assert!(!fx.root.join("a.txt").exists());
    assert_eq!(report.registered, vec!["renamed.txt".to_string()]);
    assert!(fx.vcs.borrow().calls.contains(&"log 4:4".to_string()));
}

#[test]
fn test_declined_deletion_changes_nothing() {
    let mut fx = Fixture::saved("");
    let before = fx.artifact();
    fx.upstream(
        vec![RevisionEntry::new(4, vec![PathChange::new("a.txt", ChangeAction::Deleted)])],
        4,
    );

    let mut prompts = Vec::new();
    let mut decline = |message: &str| {
        prompts.push(message.to_string());
        false
    };
    let result = fx.store.apply(0, &mut decline);

    assert!(matches!(result, Err(StashError::UserAborted)));
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("\"a.txt\""));
    assert_eq!(fx.artifact(), before);
    assert_eq!(fx.store.get(0).unwrap().revision, 3);
    assert!(fx.patch.borrow().applied.is_empty());
}

#[test]
fn test_accepted_deletion_writes_nothing_at_old_path() {
    let mut fx = Fixture::saved("");
    fx.upstream(
        vec![RevisionEntry::new(4, vec![PathChange::new("a.txt", ChangeAction::Deleted)])],
        4,
    );
    let mut confirm = accept;

    let report = fx.store.apply(0, &mut confirm).unwrap();

    assert_eq!(report.renames.get("a.txt"), Some(&PathTarget::Deleted));
    assert!(!fx.root.join("a.txt").exists());
    assert!(report.registered.is_empty());

    let artifact = String::from_utf8(fx.artifact()).unwrap();
    assert!(artifact.contains(&format!("Index: {DELETED_PATH_PREFIX}a.txt")));
}

#[test]
fn test_history_failure_keeps_stash() {
    let mut fx = Fixture::saved("");
    let before = fx.artifact();
    fx.upstream(Vec::new(), 9);
    fx.vcs.borrow_mut().fail_log = true;
    let mut confirm = accept;

    let result = fx.store.apply(0, &mut confirm);

    assert!(matches!(result, Err(StashError::HistoryUnavailable(_))));
    assert_eq!(fx.artifact(), before);
    assert_eq!(fx.store.get(0).unwrap().revision, 3);
}

#[test]
fn test_apply_refuses_dirty_working_copy() {
    let mut fx = Fixture::saved("");
    fx.vcs.borrow_mut().status = vec![StatusEntry::new(ChangeStatus::Modified, "other.txt")];
    let mut confirm = accept;

    assert!(matches!(
        fx.store.apply(0, &mut confirm),
        Err(StashError::DirtyWorkingCopy(_))
    ));
    assert!(fx.patch.borrow().applied.is_empty());
    assert!(fx.vcs.borrow().calls.is_empty());
}

#[test]
fn test_save_captures_property_only_changes() {
    let mut fx = Fixture::new();
    let props = "\nProperty changes on: src\n___________________________________________________________________\nAdded: svn:ignore\n## -0,0 +1 ##\n+target\n";
    {
        let mut vcs = fx.vcs.borrow_mut();
        vcs.status = vec![StatusEntry::new(ChangeStatus::PropertyModified, "src")];
        vcs.diff = props.as_bytes().to_vec();
    }

    fx.store.save("ignore build output").unwrap();

    assert_eq!(fx.artifact_count(), 1);
    assert_eq!(fx.artifact(), props.as_bytes());
}

#[test]
fn test_apply_refuses_property_changes() {
    let mut fx = Fixture::saved("");
    fx.vcs.borrow_mut().status = vec![StatusEntry::new(ChangeStatus::PropertyModified, ".")];
    let mut confirm = accept;

    assert!(matches!(
        fx.store.apply(0, &mut confirm),
        Err(StashError::DirtyWorkingCopy(_))
    ));
    assert!(fx.patch.borrow().applied.is_empty());
}

#[test]
fn test_failed_rebase_write_keeps_stash() {
    let mut fx = Fixture::saved("");
    fx.upstream(vec![rename_at(4, "a.txt", "renamed.txt")], 4);
    let before = fx.artifact();
    // a directory squatting on the temporary path makes the rewrite fail
    fs::create_dir(atomic_file::temp_path_for(&fx.artifact_path())).unwrap();
    let mut confirm = accept;

    let result = fx.store.apply(0, &mut confirm);

    assert!(result.is_err());
    assert_eq!(fx.artifact(), before);
    assert_eq!(fx.store.get(0).unwrap().revision, 3);
    assert!(fx.patch.borrow().applied.is_empty());
    assert!(!fx.root.join("renamed.txt").exists());
}

#[test]
fn test_apply_requires_patch_tool() {
    let mut fx = Fixture::saved("");
    fx.upstream(vec![rename_at(4, "a.txt", "renamed.txt")], 4);
    fx.patch.borrow_mut().available = false;
    let before = fx.artifact();
    let mut confirm = accept;

    let result = fx.store.apply(0, &mut confirm);

    assert!(matches!(result, Err(StashError::MissingExternalTool(name)) if name == "fakepatch"));
    assert_eq!(fx.artifact(), before);
    assert_eq!(fx.store.get(0).unwrap().revision, 3);
}

#[test]
fn test_pop_removes_stash_despite_rejects() {
    let mut fx = Fixture::saved("");
    fx.patch.borrow_mut().leave = vec![("a.txt.rej".to_string(), b"@@ -1 +1 @@\n".to_vec())];
    let artifact_path = fx.artifact_path();
    let mut confirm = accept;

    let report = fx.store.pop(0, &mut confirm).unwrap();

    assert_eq!(report.rejects, vec!["a.txt.rej".to_string()]);
    assert!(fx.store.is_empty());
    assert!(!artifact_path.exists());
    assert_eq!(fx.artifact_count(), 0);
}

#[test]
fn test_reconcile_removes_emptied_files() {
    let mut fx = Fixture::new();
    fx.vcs.borrow_mut().diff = format!(
        "{DIFF}Index: empty.txt\n===================================================================\n--- empty.txt\t(revision 3)\n+++ empty.txt\t(working copy)\n@@ -1 +0,0 @@\n-gone\n"
    )
    .into_bytes();
    fx.store.save("").unwrap();
    fx.vcs.borrow_mut().status.clear();
    fx.patch.borrow_mut().leave = vec![("empty.txt".to_string(), Vec::new())];
    let mut confirm = accept;

    let report = fx.store.apply(0, &mut confirm).unwrap();

    assert_eq!(report.registered, vec!["a.txt".to_string()]);
    assert_eq!(report.deregistered, vec!["empty.txt".to_string()]);
}

#[test]
fn test_reconcile_failures_are_warnings() {
    let mut fx = Fixture::saved("");
    fx.vcs.borrow_mut().fail_add = true;
    let mut confirm = accept;

    let report = fx.store.apply(0, &mut confirm).unwrap();

    assert!(report.registered.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("a.txt: "));
}

#[test]
fn test_remove_deletes_record_and_artifact() {
    let mut fx = Fixture::saved("doomed");
    let artifact_path = fx.artifact_path();

    let removed = fx.store.remove(0).unwrap();

    assert_eq!(removed.comment, "doomed");
    assert!(fx.store.is_empty());
    assert!(!artifact_path.exists());
}

#[test]
fn test_persisted_revision_survives_reopen() {
    let mut fx = Fixture::saved("");
    fx.upstream(vec![rename_at(4, "a.txt", "renamed.txt")], 4);
    let mut confirm = accept;
    fx.store.apply(0, &mut confirm).unwrap();
    fx.store.persist().unwrap();

    let reopened = StashStore::new(
        WorkingCopy::discover(&fx.root).unwrap(),
        Box::new(FakeVcs(fx.vcs.clone())),
        Box::new(FakePatch(fx.patch.clone())),
        ApplyOptions::default(),
    )
    .unwrap();

    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(0).unwrap().revision, 4);
    assert_eq!(
        reopened.files(0).unwrap().into_iter().map(|(_, f)| f).collect::<Vec<_>>(),
        vec!["renamed.txt".to_string()]
    );
}
