//! Command-line interface definition for bernard.
//!
//! This module defines the CLI commands and the glue between them and the
//! library: `backup` runs one or more named backups, `list` shows what a
//! container holds, `config` shows how a rule file parsed, `restore` is
//! reserved.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use bernard::driver::{self, BackupJob};
use bernard::report::Style;
use bernard::{BernardError, SymlinkPolicy};
use clap::{Parser, Subcommand};
use tokio::runtime::Builder;

use crate::sysexits;

/// Incremental backups into a single append-only tar archive.
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Directory holding `<NAME>.bernard` rule files and the archives.
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub directory: PathBuf,
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Subcommand to execute.
    #[command(subcommand)]
    pub commands: Option<Commands>,
}

/// Supported bernard commands.
#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Back up the files described by `<NAME>.bernard`.
    Backup {
        /// Backup name(s). Several names run concurrently.
        #[arg(required = true)]
        names: Vec<String>,
        /// Print one line per file instead of one symbol.
        #[arg(short, long)]
        paths: bool,
        /// Resolve symbolic links and store files under their target path.
        #[arg(long)]
        resolve_symlinks: bool,
    },
    /// Restore a backup (not implemented).
    Restore {
        /// Backup name.
        name: String,
    },
    /// List the entries recorded in a backup's archive.
    List {
        /// Backup name.
        name: String,
    },
    /// Show how `<NAME>.bernard` is parsed.
    Config {
        /// Backup name.
        name: String,
    },
}

/// Runs the backups named on the command line.
pub(crate) fn backup(
    dir: PathBuf,
    names: Vec<String>,
    paths: bool,
    resolve_symlinks: bool,
) -> Result<()> {
    let symlinks = if resolve_symlinks {
        SymlinkPolicy::Resolve
    } else {
        SymlinkPolicy::Preserve
    };
    let jobs: Vec<BackupJob> = names
        .into_iter()
        .map(|name| BackupJob {
            symlinks,
            style: if paths { Style::Paths } else { Style::Symbols },
            ..BackupJob::new(&dir, name)
        })
        .collect();

    if let [job] = jobs.as_slice() {
        let summary = driver::run_job(job, io::stdout().lock())?;
        println!("{summary}");
        return Ok(());
    }

    let rt = Builder::new_multi_thread().enable_all().build()?;
    let results = rt.block_on(driver::run_jobs(jobs));
    let total = results.len();
    let mut failures = Vec::new();
    for (name, result) in results {
        match result {
            Ok(summary) => println!("{summary}"),
            Err(e) => {
                eprintln!("Failed to run backup '{name}': {e:#}");
                failures.push(e);
            }
        }
    }
    let failed = failures.len();
    match failures.into_iter().next() {
        // The first failure decides the exit status.
        Some(first) => Err(first.context(format!("{failed} of {total} backups failed"))),
        None => Ok(()),
    }
}

/// Prints the container's entries as `<mtime> <path>`.
pub(crate) fn list(dir: PathBuf, name: String) -> Result<()> {
    let entries = driver::list(&BackupJob::new(dir, name))?;
    let mut out = io::stdout().lock();
    for (path, mtime) in entries {
        writeln!(out, "{mtime:>12} {}", path.display())?;
    }
    Ok(())
}

/// Prints the parsed rule as TOML.
pub(crate) fn config(dir: PathBuf, name: String) -> Result<()> {
    let job = BackupJob::new(dir, name);
    let rule = job.rule()?;
    println!("# {}", job.rule_file().display());
    print!("{}", toml::to_string_pretty(&rule)?);
    Ok(())
}

/// Maps an error to the exit status the process should end with.
pub(crate) fn exit_code(err: &anyhow::Error) -> i32 {
    let cause = err
        .chain()
        .find_map(|e| e.downcast_ref::<BernardError>());
    match cause {
        Some(BernardError::ConfigFormat { .. }) => sysexits::EX_CONFIG,
        Some(BernardError::ConfigRead { .. }) => sysexits::EX_NOINPUT,
        Some(BernardError::ArchiveWrite { .. })
        | Some(BernardError::ArchiveUnavailable { .. })
        | Some(BernardError::FileAccess { .. }) => sysexits::EX_IOERR,
        None if err.chain().any(|e| e.is::<io::Error>()) => sysexits::EX_IOERR,
        None => sysexits::EX_SOFTWARE,
    }
}
