use std::io;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::change::{Change, ChangeRecord};
use crate::error::HkError;
use crate::fs::{EntryKind, FileSystem, OsFs};

/// Mode a file is given before it is deleted or renamed.
pub const UNLOCKED_FILE_MODE: u32 = 0o666;
/// Mode a directory is given before it is renamed.
pub const UNLOCKED_DIR_MODE: u32 = 0o777;

/// Makes a path mutable before the applier touches it.
pub trait PermissionUnlocker {
    fn unlock(&self, path: &Path) -> io::Result<()>;
}

/// Sets the full read/write mode through a [`FileSystem`], skipping the chmod
/// when the mode already matches. Symlinks are left alone: the link itself is
/// what gets removed or renamed, never its target.
pub struct ModeUnlocker<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> ModeUnlocker<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }
}

impl PermissionUnlocker for ModeUnlocker<'_> {
    fn unlock(&self, path: &Path) -> io::Result<()> {
        let meta = self.fs.metadata(path)?;
        let target = match meta.kind {
            EntryKind::Symlink => return Ok(()),
            EntryKind::Dir => UNLOCKED_DIR_MODE,
            EntryKind::File | EntryKind::Other => UNLOCKED_FILE_MODE,
        };
        if meta.mode == target {
            return Ok(());
        }
        debug!(
            path = %path.display(),
            from = format_args!("{:o}", meta.mode),
            to = format_args!("{target:o}"),
            "chmod"
        );
        self.fs.set_mode(path, target)
    }
}

/// Outcome of [`Applier::apply_all`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Changes that succeeded, in their original relative order.
    pub applied: Vec<Change>,
    /// Number of changes that failed.
    pub failed: usize,
    /// The first failure; later ones are only logged.
    pub first_error: Option<HkError>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.first_error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<Change>, HkError> {
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(self.applied),
        }
    }

    fn record(&mut self, change: Change, result: Result<(), HkError>) {
        match result {
            Ok(()) => self.applied.push(change),
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: HkError) {
        error!(error = %err, "failed to apply change");
        self.failed += 1;
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}

/// Executes changes against a filesystem, one at a time.
pub struct Applier<'a> {
    fs: &'a dyn FileSystem,
    unlocker: Box<dyn PermissionUnlocker + 'a>,
}

impl<'a> Applier<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self {
            fs,
            unlocker: Box::new(ModeUnlocker::new(fs)),
        }
    }

    pub fn with_unlocker(mut self, unlocker: impl PermissionUnlocker + 'a) -> Self {
        self.unlocker = Box::new(unlocker);
        self
    }

    pub fn apply(&self, change: &Change) -> Result<(), HkError> {
        match change {
            Change::Delete { target } => {
                info!(path = %target.display(), "deleting");
                self.unlock(target)?;
                self.fs.remove_file(target).map_err(|source| {
                    error!(path = %target.display(), error = %source, "failed to delete");
                    HkError::Delete {
                        path: target.clone(),
                        source,
                    }
                })
            }
            Change::Rename { target, new_name } => {
                info!(from = %target.display(), to = %new_name.display(), "renaming");
                if self.fs.exists(new_name) && !self.is_same_entry(target, new_name) {
                    return Err(HkError::RenameTargetExists {
                        from: target.clone(),
                        to: new_name.clone(),
                    });
                }
                self.unlock(target)?;
                self.fs.rename(target, new_name).map_err(|source| {
                    error!(from = %target.display(), error = %source, "failed to rename");
                    HkError::Rename {
                        from: target.clone(),
                        to: new_name.clone(),
                        source,
                    }
                })
            }
            Change::RemoveDir { target } => {
                info!(path = %target.display(), "removing empty directory");
                self.fs.remove_dir(target).map_err(|source| {
                    error!(path = %target.display(), error = %source, "failed to remove dir");
                    HkError::RemoveDir {
                        path: target.clone(),
                        source,
                    }
                })
            }
        }
    }

    /// Apply every change in order, carrying on past failures.
    pub fn apply_all(&self, changes: &[Change]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for change in changes {
            let result = self.apply(change);
            report.record(change.clone(), result);
        }
        report
    }

    /// Apply the selected records. A record that does not describe a valid
    /// change fails on its own without touching the filesystem.
    pub fn apply_records(&self, records: &[ChangeRecord]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for record in records.iter().filter(|r| r.selected) {
            match Change::try_from(record) {
                Ok(change) => {
                    let result = self.apply(&change);
                    report.record(change, result);
                }
                Err(err) => {
                    warn!(path = %record.target.display(), kind = %record.kind, "unknown change type");
                    report.fail(err);
                }
            }
        }
        report
    }

    // `a.TXT` → `a.txt` on a case-insensitive volume finds the source itself.
    fn is_same_entry(&self, a: &Path, b: &Path) -> bool {
        self.fs.same_entry(a, b).unwrap_or(false)
    }

    fn unlock(&self, path: &Path) -> Result<(), HkError> {
        self.unlocker.unlock(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "unlock failed");
            HkError::Unlock {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

/// Apply against the real filesystem.
pub fn apply_all(changes: &[Change]) -> ApplyReport {
    Applier::new(&OsFs).apply_all(changes)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;
    use crate::fs::MemoryFs;

    struct FailingUnlocker;

    impl PermissionUnlocker for FailingUnlocker {
        fn unlock(&self, _path: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[derive(Default)]
    struct RecordingUnlocker {
        seen: RefCell<Vec<PathBuf>>,
    }

    impl PermissionUnlocker for &RecordingUnlocker {
        fn unlock(&self, path: &Path) -> io::Result<()> {
            self.seen.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn delete(p: &str) -> Change {
        Change::Delete { target: p.into() }
    }

    #[test]
    fn empty_list_applies_nothing() {
        let fs = MemoryFs::new();
        let report = Applier::new(&fs).apply_all(&[]);
        assert!(report.applied.is_empty());
        assert!(report.is_complete());
        assert_eq!(report.into_result().unwrap(), Vec::new());
    }

    #[test]
    fn one_missing_target_fails_alone() {
        let fs = MemoryFs::new();
        fs.add_file("/r/a.tmp").add_file("/r/c.tmp").add_dir("/r/empty");
        let changes = vec![
            delete("/r/a.tmp"),
            delete("/r/b.tmp"),
            delete("/r/c.tmp"),
            Change::RemoveDir {
                target: "/r/empty".into(),
            },
        ];

        let report = Applier::new(&fs).apply_all(&changes);
        assert_eq!(report.applied.len(), 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.applied[1], changes[2]);

        let err = report.first_error.unwrap();
        assert_eq!(err.path(), Some(Path::new("/r/b.tmp")));
        assert!(err.to_string().contains("/r/b.tmp"));
    }

    #[test]
    fn first_error_is_kept() {
        let fs = MemoryFs::new();
        let report = Applier::new(&fs).apply_all(&[delete("/r/one"), delete("/r/two")]);
        assert_eq!(report.failed, 2);
        assert_eq!(report.first_error.unwrap().path(), Some(Path::new("/r/one")));
    }

    #[test]
    fn unlock_failure_leaves_target_untouched() {
        let fs = MemoryFs::new();
        fs.add_file("/r/a.tmp");
        let applier = Applier::new(&fs).with_unlocker(FailingUnlocker);

        let err = applier.apply(&delete("/r/a.tmp")).unwrap_err();
        assert!(matches!(err, HkError::Unlock { .. }));
        assert!(fs.exists(Path::new("/r/a.tmp")));
    }

    #[test]
    fn remove_dir_is_not_unlocked() {
        let fs = MemoryFs::new();
        fs.add_dir("/r/d").add_file("/r/f.tmp");
        let unlocker = RecordingUnlocker::default();
        let applier = Applier::new(&fs).with_unlocker(&unlocker);

        applier
            .apply_all(&[
                Change::RemoveDir {
                    target: "/r/d".into(),
                },
                delete("/r/f.tmp"),
            ])
            .into_result()
            .unwrap();
        assert_eq!(*unlocker.seen.borrow(), vec![PathBuf::from("/r/f.tmp")]);
    }

    #[test]
    fn remove_dir_detects_drift() {
        let fs = MemoryFs::new();
        fs.add_dir("/r/d");
        // something appeared after planning
        fs.add_file("/r/d/new.txt");

        let err = Applier::new(&fs)
            .apply(&Change::RemoveDir {
                target: "/r/d".into(),
            })
            .unwrap_err();
        assert!(matches!(err, HkError::RemoveDir { .. }));
        assert!(fs.exists(Path::new("/r/d/new.txt")));
    }

    #[test]
    fn unlock_sets_mode_only_when_needed() {
        let fs = MemoryFs::new();
        fs.add_file_with_mode("/r/ro.txt", 0o444)
            .add_file_with_mode("/r/rw.txt", 0o666)
            .add_dir_with_mode("/r/d", 0o500);
        let unlocker = ModeUnlocker::new(&fs);

        unlocker.unlock(Path::new("/r/ro.txt")).unwrap();
        unlocker.unlock(Path::new("/r/rw.txt")).unwrap();
        unlocker.unlock(Path::new("/r/d")).unwrap();
        assert_eq!(fs.mode("/r/ro.txt"), Some(0o666));
        assert_eq!(fs.mode("/r/rw.txt"), Some(0o666));
        assert_eq!(fs.mode("/r/d"), Some(0o777));
        assert!(unlocker.unlock(Path::new("/r/missing")).is_err());
    }

    #[test]
    fn rename_refuses_to_overwrite() {
        let fs = MemoryFs::new();
        fs.add_file("/r/a.htm").add_file("/r/a.html");
        let err = Applier::new(&fs)
            .apply(&Change::Rename {
                target: "/r/a.htm".into(),
                new_name: "/r/a.html".into(),
            })
            .unwrap_err();
        assert!(matches!(err, HkError::RenameTargetExists { .. }));
        assert!(fs.exists(Path::new("/r/a.htm")));
    }

    #[test]
    fn refused_rename_leaves_mode_alone() {
        let fs = MemoryFs::new();
        fs.add_file_with_mode("/r/a.TXT", 0o444).add_file("/r/a.txt");
        let err = Applier::new(&fs)
            .apply(&Change::Rename {
                target: "/r/a.TXT".into(),
                new_name: "/r/a.txt".into(),
            })
            .unwrap_err();
        assert!(matches!(err, HkError::RenameTargetExists { .. }));
        assert_eq!(fs.mode("/r/a.TXT"), Some(0o444));
    }

    // Only meaningful where `a.TXT` and `a.txt` can coexist.
    #[cfg(target_os = "linux")]
    #[test]
    fn case_only_rename_keeps_distinct_lowercase_file() {
        let dir = tempfile::tempdir().unwrap();
        let upper = dir.path().join("a.TXT");
        let lower = dir.path().join("a.txt");
        std::fs::write(&upper, "upper").unwrap();
        std::fs::write(&lower, "lower").unwrap();

        let changes = crate::plan::plan(dir.path(), &crate::rules::RuleSet::default()).unwrap();
        assert_eq!(
            changes,
            vec![Change::Rename {
                target: upper.clone(),
                new_name: lower.clone(),
            }]
        );

        let report = apply_all(&changes);
        assert!(report.applied.is_empty());
        assert!(matches!(
            report.first_error,
            Some(HkError::RenameTargetExists { .. })
        ));
        assert_eq!(std::fs::read_to_string(&upper).unwrap(), "upper");
        assert_eq!(std::fs::read_to_string(&lower).unwrap(), "lower");
    }

    #[test]
    fn case_only_rename_of_lone_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let upper = dir.path().join("b.TXT");
        std::fs::write(&upper, "only").unwrap();

        let report = apply_all(&[Change::Rename {
            target: upper,
            new_name: dir.path().join("b.txt"),
        }]);
        assert!(report.is_complete());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("b.txt")).unwrap(),
            "only"
        );
    }

    #[test]
    fn records_apply_only_selection_and_reject_unknown_types() {
        let fs = MemoryFs::new();
        fs.add_file("/r/a.tmp").add_file("/r/b.tmp");
        let mut records: Vec<ChangeRecord> = [delete("/r/a.tmp"), delete("/r/b.tmp")]
            .iter()
            .map(ChangeRecord::from)
            .collect();
        records[1].selected = false;
        records.push(ChangeRecord {
            kind: "chmod".into(),
            target: "/r/b.tmp".into(),
            new_name: None,
            selected: true,
        });

        let report = Applier::new(&fs).apply_records(&records);
        assert_eq!(report.applied, vec![delete("/r/a.tmp")]);
        assert!(matches!(
            report.first_error,
            Some(HkError::UnknownChangeType { .. })
        ));
        assert!(fs.exists(Path::new("/r/b.tmp")));
    }

    #[cfg(unix)]
    #[test]
    fn deletes_read_only_file_on_disk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("locked.tmp");
        std::fs::write(&file, "x").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o444)).unwrap();

        let report = apply_all(&[Change::Delete {
            target: file.clone(),
        }]);
        assert!(report.is_complete());
        assert!(!file.exists());
    }
}
