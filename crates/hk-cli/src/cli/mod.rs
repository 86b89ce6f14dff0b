pub mod args;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use color_eyre::eyre::eyre;
use tracing::debug;

use hk_core::apply::{Applier, ApplyReport};
use hk_core::change::{Change, ChangeRecord};
use hk_core::config::Config;
use hk_core::error::HkError;
use hk_core::fs::{FileSystem, OsFs};
use hk_core::plan::Planner;
use hk_core::rules::RuleSet;

use crate::logging::{self, LogOptions};
use crate::tui;

use self::args::{Cli, Command, RuleArgs};

pub fn run(cli: Cli) -> color_eyre::Result<()> {
    let config = Config::load()?;

    let level = if cli.debug || config.log.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let file = cli.log_file.clone().or_else(|| config.log.path.clone());
    let console = if cli.log_file.is_some() {
        !cli.no_console_log
    } else {
        config.log.also_print_to_console
    };
    logging::init(&LogOptions {
        level,
        file,
        console,
    })?;

    match cli.command {
        Command::Plan { dir, rules, json } => cmd_plan(&config, &dir, &rules, json)?,
        Command::Apply { dir, rules, yes } => cmd_apply(&config, &dir, &rules, yes)?,
        Command::Review { dir, rules } => cmd_review(&config, &dir, &rules)?,
    }

    Ok(())
}

fn load_rules(config: &Config, args: &RuleArgs) -> Result<RuleSet, HkError> {
    let repls = match &args.repls {
        Some(path) => path.clone(),
        None => config.rename_rules_path()?,
    };
    if let Some(prefix_rules) = &args.prefix_rules {
        return RuleSet::load_with_prefixes(prefix_rules, &repls);
    }
    let exts = match &args.exts {
        Some(path) => path.clone(),
        None => config.delete_rules_path()?,
    };
    RuleSet::load(&exts, &repls)
}

fn resolve_dir(dir: &Path) -> Result<PathBuf, HkError> {
    let dir = dir
        .canonicalize()
        .map_err(|_| HkError::PathNotFound(dir.to_path_buf()))?;
    if !dir.is_dir() {
        return Err(HkError::NotADirectory(dir));
    }
    Ok(dir)
}

fn make_plan(config: &Config, dir: &Path, args: &RuleArgs) -> color_eyre::Result<Vec<Change>> {
    let rules = load_rules(config, args)?;
    let dir = resolve_dir(dir)?;
    let changes = Planner::new(&OsFs).plan(&dir, &rules)?;
    debug!(dir = %dir.display(), count = changes.len(), "plan ready");
    Ok(changes)
}

fn print_plan(changes: &[Change]) {
    println!("Found {} changes:", changes.len());
    for (i, change) in changes.iter().enumerate() {
        println!("{:2}. {change}", i + 1);
    }
}

fn reclaimable_bytes(fs: &dyn FileSystem, changes: &[Change]) -> u64 {
    changes
        .iter()
        .filter(|c| matches!(c, Change::Delete { .. }))
        .filter_map(|c| fs.metadata(c.target()).ok())
        .map(|m| m.len)
        .sum()
}

fn cmd_plan(config: &Config, dir: &Path, args: &RuleArgs, json: bool) -> color_eyre::Result<()> {
    let changes = make_plan(config, dir, args)?;

    if json {
        let records: Vec<ChangeRecord> = changes.iter().map(ChangeRecord::from).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    print_plan(&changes);
    eprintln!(
        "\nReclaimable: {}",
        ByteSize(reclaimable_bytes(&OsFs, &changes))
    );
    eprintln!("No changes applied (use `hk apply` to execute).");
    Ok(())
}

fn cmd_apply(config: &Config, dir: &Path, args: &RuleArgs, yes: bool) -> color_eyre::Result<()> {
    let changes = make_plan(config, dir, args)?;
    if changes.is_empty() {
        eprintln!("Nothing to do.");
        return Ok(());
    }
    print_plan(&changes);

    if !yes {
        eprint!("\nApply {} changes? [y/N] ", changes.len());
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Cancelled.");
            return Ok(());
        }
    }

    let report = Applier::new(&OsFs).apply_all(&changes);
    finish(report, changes.len())
}

fn cmd_review(config: &Config, dir: &Path, args: &RuleArgs) -> color_eyre::Result<()> {
    let changes = make_plan(config, dir, args)?;
    if changes.is_empty() {
        eprintln!("Nothing to do.");
        return Ok(());
    }

    let records: Vec<ChangeRecord> = changes.iter().map(ChangeRecord::from).collect();
    let Some(records) = tui::run_review(records)? else {
        eprintln!("Cancelled.");
        return Ok(());
    };

    let selected = records.iter().filter(|r| r.selected).count();
    let report = Applier::new(&OsFs).apply_records(&records);
    finish(report, selected)
}

fn finish(report: ApplyReport, attempted: usize) -> color_eyre::Result<()> {
    println!("\nApplied {} of {attempted} changes:", report.applied.len());
    for (i, change) in report.applied.iter().enumerate() {
        println!("{:2}. [APPLIED] {}", i + 1, describe(change));
    }

    match report.first_error {
        None => Ok(()),
        Some(err) => Err(eyre!(
            "{} change(s) failed; first error: {err}",
            report.failed
        )),
    }
}

fn describe(change: &Change) -> String {
    match change {
        Change::Delete { target } => format!("Deleted {}", target.display()),
        Change::Rename { target, new_name } => {
            format!("Renamed {} → {}", target.display(), new_name.display())
        }
        Change::RemoveDir { target } => format!("Removed empty dir {}", target.display()),
    }
}
