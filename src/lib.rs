//! bernard: incremental backups into a single append-only tar archive.
//!
//! A rule file (`<name>.bernard`) lists the paths to back up, an extension
//! filter, a series number and a compression flag. Each run compares the files
//! on disk with the modification times recorded in the archive and appends only
//! the files that are new or newer.

pub mod archive;
pub mod config;
pub mod constants;
pub mod driver;
pub mod engine;
pub mod error;
pub mod filter;
pub mod outcome;
pub mod path;
pub mod report;

pub use archive::{ArchiveIndex, ArchiveWriter, archive_name};
pub use config::BackupRule;
pub use engine::{Engine, Run};
pub use error::{BernardError, Result};
pub use filter::ExtensionFilter;
pub use outcome::{Action, FileOutcome};
pub use path::SymlinkPolicy;
