use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hk", about = "Filesystem housekeeper", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Show one log line per planned and applied change
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug-level logs
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// With --log-file, do not print logs to the console
    #[arg(long, global = true, requires = "log_file")]
    pub no_console_log: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the changes that would be made (nothing is modified)
    Plan {
        /// Directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        rules: RuleArgs,
        /// Output change records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plan, confirm, and apply the changes
    Apply {
        /// Directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        rules: RuleArgs,
        /// Apply without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Pick which planned changes to apply in an interactive list
    Review {
        /// Directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        rules: RuleArgs,
    },
}

#[derive(Args, Debug, Default)]
pub struct RuleArgs {
    /// JSON list of extensions to delete
    #[arg(long, value_name = "PATH")]
    pub exts: Option<PathBuf>,

    /// JSON map of extension replacements
    #[arg(long, value_name = "PATH")]
    pub repls: Option<PathBuf>,

    /// Combined prefix/extension delete config; hidden files are not matched
    #[arg(long, value_name = "PATH", conflicts_with = "exts")]
    pub prefix_rules: Option<PathBuf>,
}
