//! Runs named backups: reads `<name>.bernard`, drives the engine and renders
//! the outcomes.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tokio::task::JoinSet;

use crate::config::{self, BackupRule};
use crate::engine::Engine;
use crate::path::{self, SymlinkPolicy};
use crate::report::{Reporter, Style, Summary};

/// A named backup whose rule file and container live in `dir`.
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub name: String,
    pub dir: PathBuf,
    pub symlinks: SymlinkPolicy,
    pub style: Style,
}

impl BackupJob {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            symlinks: SymlinkPolicy::default(),
            style: Style::default(),
        }
    }

    pub fn rule_file(&self) -> PathBuf {
        config::rule_file(&self.dir, &self.name)
    }

    /// Reads and parses the rule file.
    pub fn rule(&self) -> Result<BackupRule> {
        BackupRule::load(&self.rule_file())
            .with_context(|| format!("cannot load backup '{}'", self.name))
    }

    pub fn engine(&self) -> Result<Engine> {
        Ok(Engine::new(&self.name, self.rule()?)
            .archive_dir(&self.dir)
            .symlink_policy(self.symlinks))
    }
}

/// Runs one backup, streaming each outcome to `out`.
///
/// The rule file is parsed before the filesystem is touched. Per-file errors
/// only show up in the outcomes and the summary; a failure to write the
/// container aborts the run.
pub fn run_job<W: Write>(job: &BackupJob, out: W) -> Result<Summary> {
    let engine = job.engine()?;
    let mut reporter = Reporter::new(out, job.style, engine.archive_name());
    tracing::info!(
        backup = %job.name,
        targets = engine.rule().targets.len(),
        archive = %engine.archive_path().display(),
        "starting backup"
    );

    for outcome in engine.backup() {
        let outcome = outcome.with_context(|| format!("backup '{}' aborted", job.name))?;
        reporter.record(&outcome).context("failed to write status")?;
    }

    let summary = reporter.finish().context("failed to write status")?;
    tracing::info!(backup = %job.name, %summary, "backup finished");
    Ok(summary)
}

/// Runs several backups concurrently, one blocking task each.
///
/// Every job writes its own container, so runs share nothing. A job listed
/// twice runs once. Results come back sorted by job name.
pub async fn run_jobs(jobs: Vec<BackupJob>) -> Vec<(String, Result<Summary>)> {
    let mut seen = HashSet::new();
    let mut set = JoinSet::new();
    for job in jobs {
        if !seen.insert(path::normalize(job.rule_file())) {
            tracing::warn!(backup = %job.name, "backup listed more than once, running it once");
            continue;
        }
        set.spawn_blocking(move || {
            let result = run_job(&job, io::sink());
            (job.name, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(pair) => results.push(pair),
            Err(e) => results.push((String::from("<unknown>"), Err(anyhow!("backup task failed: {e}")))),
        }
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    results
}

/// Entries recorded in the job's container as `(stored path, mtime)`, sorted
/// by path. A container that does not exist yet lists nothing.
pub fn list(job: &BackupJob) -> Result<Vec<(PathBuf, i64)>> {
    let engine = job.engine()?;
    let mut entries: Vec<(PathBuf, i64)> = engine
        .load_index()
        .iter()
        .map(|(key, mtime)| (key.to_path_buf(), mtime))
        .collect();
    entries.sort();
    Ok(entries)
}
