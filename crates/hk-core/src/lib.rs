//! Core library for `hk`, a filesystem housekeeper.
//!
//! Plans junk-file deletion, extension renames, and removal of directories
//! that end up empty, then applies the plan change by change.

pub mod apply;
pub mod change;
pub mod config;
pub mod error;
pub mod fs;
pub mod plan;
pub mod rules;
pub mod tree;

pub use apply::{Applier, ApplyReport, ModeUnlocker, PermissionUnlocker};
pub use change::{Change, ChangeRecord, ChangeType};
pub use error::HkError;
pub use fs::{FileSystem, MemoryFs, OsFs};
pub use plan::Planner;
pub use rules::{DeleteRules, RuleSet};
