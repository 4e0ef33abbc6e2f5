//! The incremental backup engine.
//!
//! An [`Engine`] holds the immutable settings of one named backup. Each call to
//! [`Engine::run`] starts a [`Run`]: a lazy iterator that walks the configured
//! targets and, for every file the filter accepts, either appends a fresh copy
//! to the container or reports it unchanged.
//!
//! A file is copied when the index has no entry for it or when its live
//! modification time, in whole seconds, is strictly newer than the recorded
//! one. Files that disappeared from disk stay in the container; it is append
//! only.
//!
//! The container is opened on the first file that needs writing, so a run that
//! finds nothing to do never creates or touches it. It is closed when the walk
//! completes, when a fatal error is returned, or when the run is dropped.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::vec;

use filetime::FileTime;
use walkdir::{DirEntry, WalkDir};

use crate::archive::{self, ArchiveIndex, ArchiveWriter};
use crate::config::BackupRule;
use crate::error::{BernardError, Result};
use crate::filter::ExtensionFilter;
use crate::outcome::FileOutcome;
use crate::path::{self, SymlinkPolicy};

/// Settings for one named backup.
#[derive(Debug, Clone)]
pub struct Engine {
    name: String,
    rule: BackupRule,
    archive_dir: PathBuf,
    symlinks: SymlinkPolicy,
}

impl Engine {
    /// The container is placed in the current directory unless
    /// [`Engine::archive_dir`] says otherwise.
    pub fn new(name: impl Into<String>, rule: BackupRule) -> Self {
        Self {
            name: name.into(),
            rule,
            archive_dir: PathBuf::from("."),
            symlinks: SymlinkPolicy::default(),
        }
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = dir.into();
        self
    }

    pub fn symlink_policy(mut self, policy: SymlinkPolicy) -> Self {
        self.symlinks = policy;
        self
    }

    pub fn rule(&self) -> &BackupRule {
        &self.rule
    }

    /// `<name>-<series>.tar[.gz]`.
    pub fn archive_name(&self) -> String {
        archive::archive_name(&self.name, self.rule.series, self.rule.compress)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.archive_dir.join(self.archive_name())
    }

    pub fn load_index(&self) -> ArchiveIndex {
        ArchiveIndex::load(&self.archive_path())
    }

    /// Starts a run against `index`.
    pub fn run(&self, index: ArchiveIndex) -> Run {
        Run {
            filter: ExtensionFilter::from(&self.rule),
            targets: self.rule.targets.clone().into_iter(),
            walker: None,
            symlinks: self.symlinks,
            archive_path: self.archive_path(),
            archive_location: locate(&self.archive_path(), self.symlinks),
            compress: self.rule.compress,
            index,
            writer: None,
            done: false,
        }
    }

    /// Loads the index of this backup's container and starts a run.
    pub fn backup(&self) -> Run {
        self.run(self.load_index())
    }
}

/// One pass over the targets. Yields an outcome per accepted file.
///
/// Per-file failures are yielded as [`crate::Action::Error`] outcomes and the
/// walk continues. An `Err` item means the container could not be written; it
/// is the last item of the run.
pub struct Run {
    filter: ExtensionFilter,
    targets: vec::IntoIter<PathBuf>,
    walker: Option<walkdir::IntoIter>,
    symlinks: SymlinkPolicy,
    archive_path: PathBuf,
    /// Where the container really lives, never backed up into itself.
    archive_location: PathBuf,
    compress: bool,
    index: ArchiveIndex,
    writer: Option<ArchiveWriter>,
    done: bool,
}

impl Run {
    /// Whether the container has been opened by this run.
    pub fn is_writing(&self) -> bool {
        self.writer.is_some()
    }

    fn next_entry(&mut self) -> Option<walkdir::Result<DirEntry>> {
        loop {
            if let Some(entry) = self.walker.as_mut().and_then(Iterator::next) {
                return Some(entry);
            }
            let target = self.targets.next()?;
            tracing::debug!(target = %target.display(), "walking");
            self.walker = Some(
                WalkDir::new(target)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter(),
            );
        }
    }

    fn visit(&mut self, entry: &DirEntry) -> Option<Result<FileOutcome>> {
        if entry.file_type().is_dir() {
            return None;
        }
        let path = path::normalize_with(entry.path(), self.symlinks);
        if !self.filter.accepts(&path) {
            tracing::trace!(path = %path.display(), "filtered out");
            return None;
        }
        if self.is_container(&path) {
            tracing::debug!(path = %path.display(), "skipping the archive itself");
            return None;
        }

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => return Some(Ok(file_error(&path, e))),
        };
        // Links to directories and special files.
        if !metadata.is_file() {
            return None;
        }

        let mtime = FileTime::from_last_modification_time(&metadata).unix_seconds();
        let key = path::archive_key(&path);
        if let Some(recorded) = self.index.get(&key) {
            if mtime <= recorded {
                tracing::debug!(path = %path.display(), mtime, recorded, "unchanged");
                return Some(Ok(FileOutcome::unchanged(&path)));
            }
        }

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => return Some(Ok(file_error(&path, e))),
        };
        let result = self
            .writer()
            .and_then(|writer| writer.append_file(&key, &metadata, &mut file));
        Some(result.map(|()| {
            tracing::debug!(path = %path.display(), mtime, "added");
            FileOutcome::added(&path)
        }))
    }

    /// Whether `path` names this run's container, possibly through a link in
    /// one of its parent directories.
    fn is_container(&self, path: &Path) -> bool {
        if path.file_name() != self.archive_location.file_name() {
            return false;
        }
        path == self.archive_location || locate(path, SymlinkPolicy::Resolve) == self.archive_location
    }

    fn writer(&mut self) -> Result<&mut ArchiveWriter> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => ArchiveWriter::open(&self.archive_path, self.compress)?,
        };
        Ok(self.writer.insert(writer))
    }

    fn close(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(writer) => writer.finish(),
            None => Ok(()),
        }
    }
}

impl Iterator for Run {
    type Item = Result<FileOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some(entry) = self.next_entry() else {
                self.done = true;
                return self.close().err().map(Err);
            };
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(Ok(walk_error(err))),
            };
            match self.visit(&entry) {
                None => continue,
                Some(Ok(outcome)) => return Some(Ok(outcome)),
                Some(Err(err)) => {
                    self.done = true;
                    // Best effort: the write error is what gets reported.
                    if let Err(close_err) = self.close() {
                        tracing::warn!(error = %close_err, "failed to close archive after write error");
                    }
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Normalizes `archive` with its parent directory resolved, when it exists.
fn locate(archive: &Path, policy: SymlinkPolicy) -> PathBuf {
    let parent = archive.parent().and_then(|dir| dir.canonicalize().ok());
    match (parent, archive.file_name()) {
        (Some(dir), Some(name)) => path::normalize_with(dir.join(name), policy),
        _ => path::normalize_with(archive, policy),
    }
}

fn file_error(path: &Path, source: std::io::Error) -> FileOutcome {
    let err = BernardError::file_access(path, source);
    tracing::warn!(error = %err, "skipping file");
    FileOutcome::error(path, err)
}

fn walk_error(err: walkdir::Error) -> FileOutcome {
    let path = path::normalize(err.path().unwrap_or(Path::new("")));
    let source = match err.into_io_error() {
        Some(io) => io,
        None => std::io::Error::other("filesystem loop"),
    };
    file_error(&path, source)
}
