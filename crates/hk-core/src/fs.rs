//! Filesystem capability used by the planner and applier.
//!
//! [`OsFs`] talks to the real disk; [`MemoryFs`] is an in-process tree used by
//! tests and dry experiments. Both walk in the same order: parents before
//! children, siblings sorted by file name.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// What kind of entry a path refers to. Symlinks are never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl From<std::fs::FileType> for EntryKind {
    fn from(ft: std::fs::FileType) -> Self {
        if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    /// Permission bits (`0o777` mask).
    pub mode: u32,
    pub len: u64,
}

/// One entry produced by [`FileSystem::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub depth: usize,
}

/// An entry the walk could not read. `path` is missing only when the
/// underlying error could not be attributed to one.
#[derive(Debug, thiserror::Error)]
#[error("{}: {source}", display_opt(.path))]
pub struct WalkError {
    pub path: Option<PathBuf>,
    #[source]
    pub source: io::Error,
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown path>".to_string())
}

pub type Walk<'a> = Box<dyn Iterator<Item = Result<WalkEntry, WalkError>> + 'a>;

pub trait FileSystem {
    /// Recursive walk rooted at `root`, yielding `root` itself first.
    fn walk<'a>(&'a self, root: &Path) -> Walk<'a>;
    /// Metadata of `path` itself (symlinks are not followed).
    fn metadata(&self, path: &Path) -> io::Result<Metadata>;
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    /// Remove an empty directory; fails if it has any entries.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Whether `a` and `b` name the same entry on disk. Two spellings of one
    /// file on a case-insensitive volume are the same entry.
    fn same_entry(&self, a: &Path, b: &Path) -> io::Result<bool>;

    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn walk<'a>(&'a self, root: &Path) -> Walk<'a> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(|res| match res {
                Ok(entry) => Ok(WalkEntry {
                    path: entry.path().to_path_buf(),
                    kind: entry.file_type().into(),
                    depth: entry.depth(),
                }),
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf);
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop"));
                    Err(WalkError { path, source })
                }
            });
        Box::new(walker)
    }

    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(Metadata {
            kind: meta.file_type().into(),
            mode: mode_of(&meta),
            len: meta.len(),
        })
    }

    #[cfg(unix)]
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut perms = std::fs::symlink_metadata(path)?.permissions();
        perms.set_readonly(mode & 0o200 == 0);
        std::fs::set_permissions(path, perms)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn same_entry(&self, a: &Path, b: &Path) -> io::Result<bool> {
        same_file::is_same_file(a, b)
    }
}

#[cfg(unix)]
fn mode_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_of(meta: &std::fs::Metadata) -> u32 {
    let base = if meta.is_dir() { 0o777 } else { 0o666 };
    if meta.permissions().readonly() {
        base & !0o222
    } else {
        base
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    kind: EntryKind,
    mode: u32,
    len: u64,
}

/// In-memory filesystem. Paths are used verbatim and compared case-sensitively,
/// so callers should stick to absolute paths.
///
/// A directory without the owner read bit (`0o400`) cannot be listed, which
/// mirrors a permission-denied `read_dir` on disk.
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: RefCell<BTreeMap<PathBuf, Node>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory and any missing ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        self.add_dir_with_mode(path, 0o755)
    }

    pub fn add_dir_with_mode(&self, path: impl AsRef<Path>, mode: u32) -> &Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.ensure_dirs(parent);
        }
        self.insert(path, EntryKind::Dir, mode, 0);
        self
    }

    /// Create a file (and its parent directories).
    pub fn add_file(&self, path: impl AsRef<Path>) -> &Self {
        self.add_file_with_mode(path, 0o644)
    }

    pub fn add_file_with_mode(&self, path: impl AsRef<Path>, mode: u32) -> &Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.ensure_dirs(parent);
        }
        self.insert(path, EntryKind::File, mode, 7);
        self
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>) -> &Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.ensure_dirs(parent);
        }
        self.insert(path, EntryKind::Symlink, 0o777, 0);
        self
    }

    /// All paths currently present, in sorted order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.nodes.borrow().keys().cloned().collect()
    }

    pub fn mode(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.nodes.borrow().get(path.as_ref()).map(|n| n.mode)
    }

    fn ensure_dirs(&self, path: &Path) {
        for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            let mut nodes = self.nodes.borrow_mut();
            nodes.entry(ancestor.to_path_buf()).or_insert(Node {
                kind: EntryKind::Dir,
                mode: 0o755,
                len: 0,
            });
        }
    }

    fn insert(&self, path: &Path, kind: EntryKind, mode: u32, len: u64) {
        self.nodes
            .borrow_mut()
            .insert(path.to_path_buf(), Node { kind, mode, len });
    }

    fn children(&self, dir: &Path) -> Vec<(PathBuf, EntryKind)> {
        self.nodes
            .borrow()
            .range::<Path, _>((std::ops::Bound::Excluded(dir), std::ops::Bound::Unbounded))
            .take_while(|(p, _)| p.starts_with(dir))
            .filter(|(p, _)| p.parent() == Some(dir))
            .map(|(p, n)| (p.clone(), n.kind))
            .collect()
    }

    fn node(&self, path: &Path) -> io::Result<Node> {
        self.nodes
            .borrow()
            .get(path)
            .copied()
            .ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

impl FileSystem for MemoryFs {
    fn walk<'a>(&'a self, root: &Path) -> Walk<'a> {
        let mut out = Vec::new();
        let root_node = match self.node(root) {
            Ok(node) => node,
            Err(source) => {
                return Box::new(std::iter::once(Err(WalkError {
                    path: Some(root.to_path_buf()),
                    source,
                })));
            }
        };

        // depth-first, pre-order
        let mut stack = vec![(root.to_path_buf(), root_node.kind, 0usize)];
        while let Some((path, kind, depth)) = stack.pop() {
            out.push(Ok(WalkEntry {
                path: path.clone(),
                kind,
                depth,
            }));
            if kind != EntryKind::Dir {
                continue;
            }
            let readable = self.mode(&path).is_some_and(|m| m & 0o400 != 0);
            if !readable {
                out.push(Err(WalkError {
                    path: Some(path.clone()),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
                }));
                continue;
            }
            for (child, child_kind) in self.children(&path).into_iter().rev() {
                stack.push((child, child_kind, depth + 1));
            }
        }
        Box::new(out.into_iter())
    }

    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        let node = self.node(path)?;
        Ok(Metadata {
            kind: node.kind,
            mode: node.mode,
            len: node.len,
        })
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut nodes = self.nodes.borrow_mut();
        let node = nodes.get_mut(path).ok_or_else(|| not_found(path))?;
        node.mode = mode & 0o777;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if self.node(path)?.kind == EntryKind::Dir {
            return Err(io::Error::other(format!("{}: is a directory", path.display())));
        }
        self.nodes.borrow_mut().remove(path);
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        if self.node(path)?.kind != EntryKind::Dir {
            return Err(io::Error::other(format!("{}: not a directory", path.display())));
        }
        if !self.children(path).is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                format!("{}: directory not empty", path.display()),
            ));
        }
        self.nodes.borrow_mut().remove(path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.node(from)?;
        if let Some(parent) = to.parent() {
            self.node(parent)?;
        }
        let mut nodes = self.nodes.borrow_mut();
        let moved: Vec<PathBuf> = nodes
            .keys()
            .filter(|p| p.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
                nodes.insert(to.join(suffix), node);
            }
        }
        Ok(())
    }

    fn same_entry(&self, a: &Path, b: &Path) -> io::Result<bool> {
        self.node(a)?;
        self.node(b)?;
        Ok(a == b)
    }
}
