//! Emptiness simulation.
//!
//! [`DirTree`] is a disposable snapshot of which directory holds which
//! entries. Planned deletions are overlaid on it and directories are then
//! collapsed bottom-up, so a directory that only becomes empty once its own
//! empty subdirectories go is found in the same pass.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::change::Change;
use crate::error::HkError;
use crate::fs::{EntryKind, FileSystem, WalkEntry, WalkError};

/// Directory path → (child path → child is a directory).
pub type DirTreeMap = BTreeMap<PathBuf, BTreeMap<PathBuf, bool>>;

#[derive(Debug, Clone)]
pub struct DirTree {
    root: PathBuf,
    dirs: DirTreeMap,
    /// Directories whose contents could not be listed. They never become keys.
    opaque: BTreeSet<PathBuf>,
}

impl DirTree {
    /// An empty snapshot holding only `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut dirs = DirTreeMap::new();
        dirs.insert(root.clone(), BTreeMap::new());
        Self {
            root,
            dirs,
            opaque: BTreeSet::new(),
        }
    }

    /// Walk `root` and record every entry.
    ///
    /// Fails only when `root` itself cannot be listed; anything deeper that
    /// cannot be read is kept as opaque content.
    pub fn scan(fs: &dyn FileSystem, root: &Path) -> Result<Self, HkError> {
        let mut tree = Self::new(root);
        for entry in fs.walk(root) {
            match entry {
                Ok(entry) => tree.record(&entry),
                Err(err) => tree.record_error(err)?,
            }
        }
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dirs(&self) -> &DirTreeMap {
        &self.dirs
    }

    /// Add one walked entry to its parent's child set. Directories also get a
    /// key of their own, even before any of their children are seen.
    pub fn record(&mut self, entry: &WalkEntry) {
        if entry.path == self.root {
            return;
        }
        let is_dir = entry.kind == EntryKind::Dir;
        if let Some(parent) = entry.path.parent()
            && !self.opaque.contains(parent)
        {
            self.dirs
                .entry(parent.to_path_buf())
                .or_default()
                .insert(entry.path.clone(), is_dir);
        }
        if is_dir && !self.opaque.contains(&entry.path) {
            self.dirs.entry(entry.path.clone()).or_default();
        }
    }

    /// Absorb a walk error. An unreadable root is fatal; any other path is
    /// pinned as content of its parent and never proposed for removal.
    pub fn record_error(&mut self, err: WalkError) -> Result<(), HkError> {
        let Some(path) = err.path else {
            warn!(error = %err.source, "skipping unreadable entry");
            return Ok(());
        };
        if path == self.root {
            return Err(HkError::RootUnreadable {
                path,
                source: err.source,
            });
        }
        warn!(path = %path.display(), error = %err.source, "skipping unreadable entry");
        self.mark_opaque(path);
        Ok(())
    }

    fn mark_opaque(&mut self, path: PathBuf) {
        if let Some(children) = path.parent().and_then(|p| self.dirs.get_mut(p)) {
            children.entry(path.clone()).or_insert(true);
        }
        self.dirs.remove(&path);
        self.opaque.insert(path);
    }

    /// Drop the targets of planned deletions and directory removals.
    pub fn overlay(&mut self, planned: &[Change]) {
        for change in planned {
            let target = match change {
                Change::Delete { target } | Change::RemoveDir { target } => target,
                Change::Rename { .. } => continue,
            };
            if let Some(children) = target.parent().and_then(|p| self.dirs.get_mut(p)) {
                children.remove(target);
            }
            if matches!(change, Change::RemoveDir { .. }) {
                self.dirs.remove(target);
            }
        }
    }

    /// Emit a `RemoveDir` for every directory that is empty, deepest first.
    ///
    /// Each removal is taken out of its parent's child set before the parent is
    /// visited, so chains of empty directories collapse in one pass.
    pub fn collapse(mut self) -> Vec<Change> {
        let mut order: Vec<PathBuf> = self.dirs.keys().cloned().collect();
        order.sort_by(|a, b| {
            Reverse(depth(a))
                .cmp(&Reverse(depth(b)))
                .then_with(|| a.cmp(b))
        });

        let mut removed = BTreeSet::new();
        let mut out = Vec::new();
        for dir in order {
            if removed.contains(&dir) {
                continue;
            }
            let empty = self.dirs.get(&dir).is_some_and(BTreeMap::is_empty);
            if !empty {
                continue;
            }
            debug!(dir = %dir.display(), "directory becomes empty");
            if let Some(siblings) = dir.parent().and_then(|p| self.dirs.get_mut(p)) {
                siblings.remove(&dir);
            }
            out.push(Change::RemoveDir {
                target: dir.clone(),
            });
            removed.insert(dir);
        }
        out
    }
}

fn depth(path: &Path) -> usize {
    path.components().count()
}

/// Directory removals implied by `planned`, from a fresh walk of `root`.
pub fn simulate(
    fs: &dyn FileSystem,
    root: &Path,
    planned: &[Change],
) -> Result<Vec<Change>, HkError> {
    let root = std::path::absolute(root).map_err(|_| HkError::PathNotFound(root.to_path_buf()))?;
    let mut tree = DirTree::scan(fs, &root)?;
    tree.overlay(&absolutize(planned)?);
    Ok(tree.collapse())
}

fn absolutize(planned: &[Change]) -> Result<Vec<Change>, HkError> {
    let abs = |p: &Path| std::path::absolute(p).map_err(|_| HkError::PathNotFound(p.to_path_buf()));
    planned
        .iter()
        .map(|c| {
            Ok(match c {
                Change::Delete { target } => Change::Delete {
                    target: abs(target)?,
                },
                Change::RemoveDir { target } => Change::RemoveDir {
                    target: abs(target)?,
                },
                Change::Rename { .. } => c.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFs, OsFs};

    fn targets(changes: &[Change]) -> Vec<String> {
        changes
            .iter()
            .map(|c| c.target().to_string_lossy().into_owned())
            .collect()
    }

    fn delete(p: &str) -> Change {
        Change::Delete { target: p.into() }
    }

    #[test]
    fn empty_root_is_removed() {
        let fs = MemoryFs::new();
        fs.add_dir("/r");
        let out = simulate(&fs, Path::new("/r"), &[]).unwrap();
        assert_eq!(targets(&out), ["/r"]);
    }

    #[test]
    fn nested_empty_dirs_collapse_deepest_first() {
        let fs = MemoryFs::new();
        fs.add_dir("/r/nested/a").add_dir("/r/nested/b/b1");

        let out = simulate(&fs, Path::new("/r"), &[]).unwrap();
        assert_eq!(
            targets(&out),
            ["/r/nested/b/b1", "/r/nested/a", "/r/nested/b", "/r/nested", "/r"]
        );
    }

    #[test]
    fn directory_of_deleted_files_is_removed() {
        let fs = MemoryFs::new();
        fs.add_file("/r/junk/a.tmp")
            .add_file("/r/junk/b.tmp")
            .add_file("/r/keep.txt");

        let out = simulate(
            &fs,
            Path::new("/r"),
            &[delete("/r/junk/a.tmp"), delete("/r/junk/b.tmp")],
        )
        .unwrap();
        assert_eq!(targets(&out), ["/r/junk"]);
    }

    #[test]
    fn mixed_directory_keeps_its_live_branch() {
        let fs = MemoryFs::new();
        fs.add_dir("/r/mixed/empty")
            .add_file("/r/mixed/full/keep.txt")
            .add_file("/r/mixed/full/drop.tmp");

        let out = simulate(&fs, Path::new("/r"), &[delete("/r/mixed/full/drop.tmp")]).unwrap();
        assert_eq!(targets(&out), ["/r/mixed/empty"]);
    }

    #[test]
    fn renames_do_not_empty_a_directory() {
        let fs = MemoryFs::new();
        fs.add_file("/r/d/page.htm");
        let planned = [Change::Rename {
            target: "/r/d/page.htm".into(),
            new_name: "/r/d/page.html".into(),
        }];
        assert!(simulate(&fs, Path::new("/r"), &planned).unwrap().is_empty());
    }

    #[test]
    fn planned_dir_removal_counts_as_gone() {
        let fs = MemoryFs::new();
        fs.add_dir("/r/outer/inner");
        let mut tree = DirTree::scan(&fs, Path::new("/r")).unwrap();
        tree.overlay(&[Change::RemoveDir {
            target: "/r/outer/inner".into(),
        }]);
        assert!(!tree.dirs().contains_key(Path::new("/r/outer/inner")));
        assert_eq!(targets(&tree.collapse()), ["/r/outer", "/r"]);
    }

    #[test]
    fn unreadable_directory_is_never_proposed() {
        let fs = MemoryFs::new();
        fs.add_dir("/r").add_dir_with_mode("/r/locked", 0o000);

        let tree = DirTree::scan(&fs, Path::new("/r")).unwrap();
        assert!(!tree.dirs().contains_key(Path::new("/r/locked")));
        // the locked dir still counts as content of the root
        assert!(simulate(&fs, Path::new("/r"), &[]).unwrap().is_empty());
    }

    #[test]
    fn unreadable_root_is_fatal() {
        let fs = MemoryFs::new();
        fs.add_dir_with_mode("/r", 0o000);
        let err = DirTree::scan(&fs, Path::new("/r")).unwrap_err();
        assert!(matches!(err, HkError::RootUnreadable { .. }));
    }

    #[test]
    fn parents_get_keys_even_if_only_seen_through_files() {
        let mut tree = DirTree::new("/r");
        tree.record(&WalkEntry {
            path: "/r/a/b/file.txt".into(),
            kind: EntryKind::File,
            depth: 3,
        });
        assert!(tree.dirs().contains_key(Path::new("/r/a/b")));
    }

    #[test]
    fn ties_break_by_path() {
        let fs = MemoryFs::new();
        fs.add_dir("/r/c").add_dir("/r/a").add_dir("/r/b");
        let out = simulate(&fs, Path::new("/r"), &[]).unwrap();
        assert_eq!(targets(&out), ["/r/a", "/r/b", "/r/c", "/r"]);
    }

    #[test]
    fn matches_real_directory_with_only_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("inaccessible.txt");
        std::fs::write(&file, "content").unwrap();

        let out = simulate(&OsFs, dir.path(), &[Change::Delete { target: file }]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target(), dir.path());
    }
}
