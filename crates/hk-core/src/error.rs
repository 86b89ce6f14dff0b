use std::path::{Path, PathBuf};

/// Errors produced by core `hk` operations.
#[derive(Debug, thiserror::Error)]
pub enum HkError {
    #[error("failed to read {kind} rules from {}: {source}", .path.display())]
    RulesRead {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {kind} rules in {}: {source}", .path.display())]
    RulesParse {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rename rules map {key:?} more than once (keys are case-insensitive)")]
    DuplicateRenameKey { key: String },

    #[error("failed to read settings from {}: {source}", .path.display())]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    #[error("path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot read directory {}: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unlocking {}: {source}", .path.display())]
    Unlock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deleting {}: {source}", .path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("renaming {} → {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("renaming {} → {}: destination already exists", .from.display(), .to.display())]
    RenameTargetExists { from: PathBuf, to: PathBuf },

    #[error("removing dir {}: {source}", .path.display())]
    RemoveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown change type {kind:?} for {}", .target.display())]
    UnknownChangeType { kind: String, target: PathBuf },
}

impl HkError {
    /// The filesystem path this error is about, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            HkError::RulesRead { path, .. }
            | HkError::RulesParse { path, .. }
            | HkError::SettingsRead { path, .. }
            | HkError::RootUnreadable { path, .. }
            | HkError::Unlock { path, .. }
            | HkError::Delete { path, .. }
            | HkError::RemoveDir { path, .. } => Some(path),
            HkError::PathNotFound(path) | HkError::NotADirectory(path) => Some(path),
            HkError::Rename { from, .. } | HkError::RenameTargetExists { from, .. } => Some(from),
            HkError::UnknownChangeType { target, .. } => Some(target),
            HkError::DuplicateRenameKey { .. } | HkError::NoConfigDir => None,
        }
    }
}
