use std::fmt;
use std::path::{Path, PathBuf};

/// What a backup run did with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// A fresh copy was appended to the archive.
    Added,
    /// The archive copy is current.
    Unchanged,
    /// The file could not be stat'ed or read.
    Error,
}

impl Action {
    /// Single-character status symbol.
    pub fn symbol(self) -> char {
        match self {
            Action::Added => '+',
            Action::Unchanged => '.',
            Action::Error => '!',
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Added => "added",
            Action::Unchanged => "unchanged",
            Action::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub action: Action,
    /// Why the file failed, for [`Action::Error`].
    pub error: Option<String>,
}

impl FileOutcome {
    pub(crate) fn added(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            action: Action::Added,
            error: None,
        }
    }

    pub(crate) fn unchanged(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            action: Action::Unchanged,
            error: None,
        }
    }

    pub(crate) fn error(path: &Path, detail: impl fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            action: Action::Error,
            error: Some(detail.to_string()),
        }
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.symbol(), self.path.display())?;
        if let Some(detail) = &self.error {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}
