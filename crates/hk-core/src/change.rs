use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HkError;

/// The kind of mutation a [`Change`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    #[serde(rename = "delete_file")]
    Delete,
    #[serde(rename = "rename_file")]
    Rename,
    #[serde(rename = "remove_dir")]
    RemoveDir,
}

impl ChangeType {
    /// Wire name used in JSON output and change records.
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Delete => "delete_file",
            ChangeType::Rename => "rename_file",
            ChangeType::RemoveDir => "remove_dir",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete_file" => Ok(ChangeType::Delete),
            "rename_file" => Ok(ChangeType::Rename),
            "remove_dir" => Ok(ChangeType::RemoveDir),
            other => Err(other.to_string()),
        }
    }
}

/// A single planned or applied filesystem mutation.
///
/// Only [`Change::Rename`] carries a destination, so a delete or directory
/// removal can never hold a stray new name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Delete { target: PathBuf },
    Rename { target: PathBuf, new_name: PathBuf },
    RemoveDir { target: PathBuf },
}

impl Change {
    pub fn kind(&self) -> ChangeType {
        match self {
            Change::Delete { .. } => ChangeType::Delete,
            Change::Rename { .. } => ChangeType::Rename,
            Change::RemoveDir { .. } => ChangeType::RemoveDir,
        }
    }

    pub fn target(&self) -> &Path {
        match self {
            Change::Delete { target }
            | Change::Rename { target, .. }
            | Change::RemoveDir { target } => target,
        }
    }

    pub fn new_name(&self) -> Option<&Path> {
        match self {
            Change::Rename { new_name, .. } => Some(new_name),
            _ => None,
        }
    }

    /// Build a change from its wire-level parts.
    pub fn from_parts(kind: &str, target: PathBuf, new_name: Option<PathBuf>) -> Result<Self, HkError> {
        let kind = kind
            .parse::<ChangeType>()
            .map_err(|kind| HkError::UnknownChangeType {
                kind,
                target: target.clone(),
            })?;
        Ok(match (kind, new_name) {
            (ChangeType::Delete, _) => Change::Delete { target },
            (ChangeType::RemoveDir, _) => Change::RemoveDir { target },
            (ChangeType::Rename, Some(new_name)) if !new_name.as_os_str().is_empty() => {
                Change::Rename { target, new_name }
            }
            (ChangeType::Rename, _) => {
                return Err(HkError::UnknownChangeType {
                    kind: "rename_file without newName".to_string(),
                    target,
                });
            }
        })
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Delete { target } => write!(f, "[DELETE]     {}", target.display()),
            Change::Rename { target, new_name } => write!(
                f,
                "[RENAME]     {} → {}",
                target.display(),
                new_name.display()
            ),
            Change::RemoveDir { target } => write!(f, "[REMOVE DIR] {}", target.display()),
        }
    }
}

/// UI-facing view of a [`Change`] with a per-change selection flag.
///
/// Front ends hand these to the user, let them untick entries, and pass the
/// remainder back to [`crate::apply::Applier::apply_records`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<PathBuf>,
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl From<&Change> for ChangeRecord {
    fn from(change: &Change) -> Self {
        Self {
            kind: change.kind().as_str().to_string(),
            target: change.target().to_path_buf(),
            new_name: change.new_name().map(Path::to_path_buf),
            selected: true,
        }
    }
}

impl TryFrom<&ChangeRecord> for Change {
    type Error = HkError;

    fn try_from(record: &ChangeRecord) -> Result<Self, Self::Error> {
        Change::from_parts(&record.kind, record.target.clone(), record.new_name.clone())
    }
}
