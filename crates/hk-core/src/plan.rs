use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::change::Change;
use crate::error::HkError;
use crate::fs::{EntryKind, FileSystem, OsFs};
use crate::rules::{self, RuleSet};
use crate::tree::DirTree;

/// Produces the ordered change list for a directory tree.
///
/// A single walk both classifies files and records the tree snapshot that the
/// emptiness simulation runs on.
#[derive(Clone, Copy)]
pub struct Planner<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> Planner<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Deletes and renames in walk order, then directory removals deepest first.
    pub fn plan(&self, root: &Path, rules: &RuleSet) -> Result<Vec<Change>, HkError> {
        let root = std::path::absolute(root).map_err(|_| HkError::PathNotFound(root.to_path_buf()))?;
        let meta = self.fs.metadata(&root).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => HkError::PathNotFound(root.clone()),
            _ => HkError::RootUnreadable {
                path: root.clone(),
                source,
            },
        })?;
        if meta.kind != EntryKind::Dir {
            return Err(HkError::NotADirectory(root));
        }

        let mut tree = DirTree::new(&root);
        let mut changes = Vec::new();

        for entry in self.fs.walk(&root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tree.record_error(err)?;
                    continue;
                }
            };
            tree.record(&entry);
            if entry.kind == EntryKind::Dir {
                continue;
            }

            match rules::classify(&entry.path, rules) {
                Some(change) => {
                    info!(change = %change, "planned");
                    changes.push(change);
                }
                None => debug!(path = %entry.path.display(), "keep"),
            }
        }

        tree.overlay(&changes);
        let removals = tree.collapse();
        for removal in &removals {
            info!(change = %removal, "planned");
        }
        changes.extend(removals);

        Ok(changes)
    }
}

/// Plan against the real filesystem.
pub fn plan(root: &Path, rules: &RuleSet) -> Result<Vec<Change>, HkError> {
    Planner::new(&OsFs).plan(root, rules)
}
