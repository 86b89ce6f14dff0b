use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::HkError;

pub const DELETE_RULES_FILE: &str = "extensions_to_delete.json";
pub const RENAME_RULES_FILE: &str = "extension_replacements.json";

/// User settings loaded from `~/.config/hk/config.toml`.
///
/// All fields have sensible defaults so the settings file is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to the JSON list of extensions to delete.
    pub delete_rules: Option<PathBuf>,
    /// Path to the JSON map of extension replacements.
    pub rename_rules: Option<PathBuf>,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// Append log lines to this file as well as (or instead of) the console.
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_also_print_to_console")]
    pub also_print_to_console: bool,
}

fn default_also_print_to_console() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: None,
            debug: false,
            also_print_to_console: default_also_print_to_console(),
        }
    }
}

impl Config {
    /// Load the settings file, or defaults if there is none.
    pub fn load() -> Result<Self, HkError> {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(HkError::NoConfigDir) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, HkError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| HkError::SettingsRead {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        toml::from_str(&content).map_err(|e| HkError::SettingsRead {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }

    pub fn config_path() -> Result<PathBuf, HkError> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    pub fn delete_rules_path(&self) -> Result<PathBuf, HkError> {
        match &self.delete_rules {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.config_dir().join(DELETE_RULES_FILE)),
        }
    }

    pub fn rename_rules_path(&self) -> Result<PathBuf, HkError> {
        match &self.rename_rules {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.config_dir().join(RENAME_RULES_FILE)),
        }
    }

    fn project_dirs() -> Result<ProjectDirs, HkError> {
        ProjectDirs::from("", "", "hk").ok_or(HkError::NoConfigDir)
    }
}
