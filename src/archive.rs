//! The archive container.
//!
//! A container is a tar file, optionally gzip compressed, named
//! `<name>-<series>.tar[.gz]`. It only ever grows:
//!
//! - plain containers are extended in place, new entries overwrite the
//!   end-of-archive marker and a fresh marker is written after them;
//! - compressed containers get one extra gzip member per run, holding its own
//!   tar stream. Readers decode all members and skip the interior markers.
//!
//! The modification time recorded in each entry header is what the next run
//! compares live files against.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};

use filetime::FileTime;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder, Header, HeaderMode};

use crate::constants::{ARCHIVE_EXTENSION, COMPRESSED_SUFFIX};
use crate::error::{BernardError, Result};
use crate::path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BLOCK_SIZE: u64 = 512;

/// Returns the container file name for a backup.
///
/// ```
/// assert_eq!(bernard::archive::archive_name("test2", 3, true), "test2-3.tar.gz");
/// assert_eq!(bernard::archive::archive_name("test2", 1, false), "test2-1.tar");
/// ```
pub fn archive_name(name: &str, series: i64, compress: bool) -> String {
    if compress {
        format!("{name}-{series}.{ARCHIVE_EXTENSION}.{COMPRESSED_SUFFIX}")
    } else {
        format!("{name}-{series}.{ARCHIVE_EXTENSION}")
    }
}

/// Stored path → last recorded modification time (whole seconds).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveIndex {
    entries: HashMap<PathBuf, i64>,
}

impl ArchiveIndex {
    /// Builds the index of the container at `path`.
    ///
    /// A missing or unreadable container yields an empty index: nothing has
    /// been backed up yet as far as the caller is concerned.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(index) => index,
            Err(BernardError::ArchiveUnavailable { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                tracing::debug!(archive = %path.display(), "no archive yet");
                Self::default()
            }
            Err(err) => {
                tracing::warn!(archive = %path.display(), error = %err, "ignoring unreadable archive");
                Self::default()
            }
        }
    }

    /// Like [`ArchiveIndex::load`], but reports why the container could not be
    /// read.
    pub fn try_load(path: &Path) -> Result<Self> {
        let unavailable = |source: io::Error| BernardError::ArchiveUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unavailable)?;
        let mut reader = BufReader::new(file);
        let compressed = reader.fill_buf().map_err(unavailable)?.starts_with(&GZIP_MAGIC);
        let entries = if compressed {
            read_entries(MultiGzDecoder::new(reader))
        } else {
            read_entries(reader)
        }
        .map_err(unavailable)?;

        tracing::debug!(archive = %path.display(), entries = entries.len(), "loaded archive index");
        Ok(Self { entries })
    }

    /// Recorded modification time of the entry stored under `key`.
    pub fn get(&self, key: impl AsRef<Path>) -> Option<i64> {
        self.entries.get(key.as_ref()).copied()
    }

    pub fn contains(&self, key: impl AsRef<Path>) -> bool {
        self.entries.contains_key(key.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, i64)> {
        self.entries.iter().map(|(k, v)| (k.as_path(), *v))
    }
}

impl FromIterator<(PathBuf, i64)> for ArchiveIndex {
    fn from_iter<I: IntoIterator<Item = (PathBuf, i64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn read_entries<R: Read>(reader: R) -> io::Result<HashMap<PathBuf, i64>> {
    let mut archive = Archive::new(reader);
    archive.set_ignore_zeros(true);

    let mut entries = HashMap::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        // Entries are stored root-relative; re-attach a root so the name goes
        // through the same normalization as live paths.
        let name = entry.path()?;
        let key = path::archive_key(&path::normalize(Path::new(MAIN_SEPARATOR_STR).join(name)));
        if key.as_os_str().is_empty() {
            continue;
        }
        // Pre-epoch times are stored as two's complement.
        let mtime = entry.header().mtime()? as i64;
        // Later entries supersede earlier ones.
        entries.insert(key, mtime);
    }
    Ok(entries)
}

/// Offset just past the last entry of a plain container, i.e. where its
/// end-of-archive marker starts. Zero if the file does not exist.
fn end_of_entries(path: &Path) -> io::Result<u64> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut archive = Archive::new(BufReader::new(file));
    archive.set_ignore_zeros(true);

    let mut end = 0;
    for entry in archive.entries()? {
        let entry = entry?;
        let padded = entry.size().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        end = end.max(entry.raw_file_position() + padded);
    }
    Ok(end)
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
    fn finish(self) -> io::Result<()> {
        let writer = match self {
            Sink::Plain(writer) => writer,
            Sink::Gzip(encoder) => encoder.finish()?,
        };
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Append handle on a container.
///
/// Call [`ArchiveWriter::finish`] to close it and observe errors. Dropping an
/// unfinished writer still terminates the container, errors are only logged.
pub struct ArchiveWriter {
    path: PathBuf,
    builder: Option<Builder<Sink>>,
    appended: usize,
}

impl ArchiveWriter {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path, compress: bool) -> Result<Self> {
        let write_err = |e| BernardError::archive_write(path, e);

        let sink = if compress {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(write_err)?;
            Sink::Gzip(GzEncoder::new(BufWriter::new(file), Compression::default()))
        } else {
            let end = end_of_entries(path).map_err(write_err)?;
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(path)
                .map_err(write_err)?;
            file.seek(SeekFrom::Start(end)).map_err(write_err)?;
            Sink::Plain(BufWriter::new(file))
        };

        tracing::info!(archive = %path.display(), compress, "opened archive for appending");
        Ok(Self {
            path: path.to_path_buf(),
            builder: Some(Builder::new(sink)),
            appended: 0,
        })
    }

    /// Number of entries appended through this handle.
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Appends the contents of `file` under the stored name `key`.
    ///
    /// Exactly `metadata.len()` bytes are written: a file that shrinks while
    /// being copied is padded with zeros, one that grows is cut off.
    pub fn append_file(
        &mut self,
        key: impl AsRef<Path>,
        metadata: &fs::Metadata,
        file: &mut File,
    ) -> Result<()> {
        let Some(builder) = self.builder.as_mut() else {
            return Err(BernardError::archive_write(
                &self.path,
                io::Error::other("archive already finished"),
            ));
        };

        let size = metadata.len();
        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(metadata, HeaderMode::Complete);
        header.set_size(size);
        let mtime = FileTime::from_last_modification_time(metadata).unix_seconds();
        header.set_mtime(mtime as u64);

        let data = file.take(size).chain(io::repeat(0)).take(size);
        builder
            .append_data(&mut header, key, data)
            .map_err(|e| BernardError::archive_write(&self.path, e))?;
        self.appended += 1;
        Ok(())
    }

    /// Writes the end-of-archive marker and flushes everything to disk.
    pub fn finish(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        let Some(builder) = self.builder.take() else {
            return Ok(());
        };
        builder
            .into_inner()
            .and_then(Sink::finish)
            .map_err(|e| BernardError::archive_write(&self.path, e))?;
        tracing::info!(archive = %self.path.display(), appended = self.appended, "closed archive");
        Ok(())
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close archive");
        }
    }
}
