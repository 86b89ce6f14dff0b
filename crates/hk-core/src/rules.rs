//! Rule matching: decides, for one file path, whether it is junk to delete or
//! a file whose extension should be rewritten.
//!
//! Everything here is pure. Loading the JSON rule documents is the only I/O
//! and happens once, before planning starts.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::change::Change;
use crate::error::HkError;

/// Name prefixes that always mark a file as junk under the job profile.
///
/// `.` already covers the other two; they are kept so the list documents what
/// the profile is meant to catch (AppleDouble files and Finder metadata).
pub const HIDDEN_JUNK_PREFIXES: &[&str] = &["._", ".DS_Store", "."];

/// How files are selected for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRules {
    /// Extension allow-list plus the fixed hidden-file patterns.
    ExtensionsAndHidden { extensions: Vec<String> },
    /// Case-insensitive name prefixes plus extension suffixes. Hidden files are
    /// not special under this profile.
    PrefixesAndExtensions {
        prefixes: Vec<String>,
        extensions: Vec<String>,
    },
}

impl Default for DeleteRules {
    fn default() -> Self {
        DeleteRules::ExtensionsAndHidden {
            extensions: Vec::new(),
        }
    }
}

/// The full rule set consumed by the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub delete: DeleteRules,
    /// Lowercase source extension (with dot) → replacement extension.
    pub rename: BTreeMap<String, String>,
}

/// Legacy combined delete document: `{"extensions_to_delete": [...], "prefixes_to_delete": [...]}`.
#[derive(Debug, Deserialize)]
struct PrefixRulesFile {
    #[serde(default)]
    extensions_to_delete: Vec<String>,
    #[serde(default)]
    prefixes_to_delete: Vec<String>,
}

impl RuleSet {
    /// Job-profile rules built from in-memory values.
    pub fn new(extensions: &[&str], rename: &[(&str, &str)]) -> Result<Self, HkError> {
        Ok(Self {
            delete: DeleteRules::ExtensionsAndHidden {
                extensions: normalize(extensions.iter().copied()),
            },
            rename: normalize_rename(
                rename
                    .iter()
                    .map(|(from, to)| ((*from).to_string(), (*to).to_string())),
            )?,
        })
    }

    /// Load job-profile rules from the delete list and rename map documents.
    pub fn load(delete_path: &Path, rename_path: &Path) -> Result<Self, HkError> {
        let extensions: Vec<String> = read_json(delete_path, "delete")?;
        let rename: BTreeMap<String, String> = read_json(rename_path, "rename")?;
        Ok(Self {
            delete: DeleteRules::ExtensionsAndHidden {
                extensions: normalize(extensions.iter().map(String::as_str)),
            },
            rename: normalize_rename(rename)?,
        })
    }

    /// Load prefix-profile rules from a combined delete document, paired with a
    /// rename map document.
    pub fn load_with_prefixes(prefix_path: &Path, rename_path: &Path) -> Result<Self, HkError> {
        let file: PrefixRulesFile = read_json(prefix_path, "prefix")?;
        let rename: BTreeMap<String, String> = read_json(rename_path, "rename")?;
        Ok(Self {
            delete: DeleteRules::PrefixesAndExtensions {
                prefixes: normalize(file.prefixes_to_delete.iter().map(String::as_str)),
                extensions: normalize(file.extensions_to_delete.iter().map(String::as_str)),
            },
            rename: normalize_rename(rename)?,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, kind: &'static str) -> Result<T, HkError> {
    let content = std::fs::read_to_string(path).map_err(|source| HkError::RulesRead {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| HkError::RulesParse {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

fn normalize<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(str::to_lowercase)
        .filter(|s| !s.is_empty())
        .collect()
}

fn normalize_rename(
    pairs: impl IntoIterator<Item = (String, String)>,
) -> Result<BTreeMap<String, String>, HkError> {
    let mut map = BTreeMap::new();
    for (from, to) in pairs {
        let key = from.to_lowercase();
        if map.insert(key.clone(), to).is_some() {
            return Err(HkError::DuplicateRenameKey { key });
        }
    }
    Ok(map)
}

/// Case-insensitive name prefix match.
pub fn matches_prefix(name: &str, prefixes: &[String]) -> bool {
    let lower = name.to_lowercase();
    prefixes.iter().any(|p| lower.starts_with(p.as_str()))
}

/// Case-insensitive name suffix match against an extension list.
pub fn matches_extension(name: &str, extensions: &[String]) -> bool {
    let lower = name.to_lowercase();
    extensions.iter().any(|e| lower.ends_with(e.as_str()))
}

/// Dot files, AppleDouble `._` files and `.DS_Store`.
pub fn is_hidden_junk(name: &str) -> bool {
    HIDDEN_JUNK_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Return a `Delete` change when `path`'s file name matches the delete rules.
///
/// Checks run prefix, then extension, then hidden patterns; the profile decides
/// which of them take part.
pub fn match_delete(path: &Path, rules: &RuleSet) -> Option<Change> {
    let name = path.file_name()?.to_str()?;
    let hit = match &rules.delete {
        DeleteRules::ExtensionsAndHidden { extensions } => {
            matches_extension(name, extensions) || is_hidden_junk(name)
        }
        DeleteRules::PrefixesAndExtensions {
            prefixes,
            extensions,
        } => matches_prefix(name, prefixes) || matches_extension(name, extensions),
    };
    hit.then(|| Change::Delete {
        target: path.to_path_buf(),
    })
}

/// Split a file name at its last `.`; the extension keeps the dot.
///
/// `"a.TXT"` → `("a", ".TXT")`, `".bashrc"` → `("", ".bashrc")`,
/// `"Makefile"` → `("Makefile", "")`.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) => name.split_at(i),
        None => (name, ""),
    }
}

/// Return a `Rename` change when the extension is mapped or not yet lowercase.
pub fn match_rename(path: &Path, rules: &RuleSet) -> Option<Change> {
    let name = path.file_name()?.to_str()?;
    let (stem, ext) = split_extension(name);
    if ext.is_empty() {
        return None;
    }
    let lower = ext.to_lowercase();

    let new_ext = match rules.rename.get(&lower) {
        Some(mapped) => mapped.as_str(),
        None if lower != ext => lower.as_str(),
        None => return None,
    };

    Some(Change::Rename {
        target: path.to_path_buf(),
        new_name: path.with_file_name(format!("{stem}{new_ext}")),
    })
}

/// Classify one file: delete wins, rename is only considered otherwise.
pub fn classify(path: &Path, rules: &RuleSet) -> Option<Change> {
    match_delete(path, rules).or_else(|| match_rename(path, rules))
}
