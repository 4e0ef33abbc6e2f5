//! Path normalization.
//!
//! Live filesystem paths and archive entry names are compared through the same
//! normalization so that a file recorded by an earlier run is recognised again.
//! Archive entries are stored without their root component (`/`, `C:\`), which
//! keeps containers portable between machines.

use std::env;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

/// How symbolic links are treated while normalizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SymlinkPolicy {
    /// Keep the link's own path. Purely lexical, never touches the disk.
    #[default]
    Preserve,
    /// Resolve links to their target when the path exists.
    Resolve,
}

/// Normalizes `path` with [`SymlinkPolicy::Preserve`].
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    normalize_with(path, SymlinkPolicy::Preserve)
}

/// Returns an absolute, lexically clean form of `path`.
///
/// `.` and `..` segments and duplicate separators are collapsed and the case is
/// folded on platforms with case-insensitive filesystems. Paths that do not
/// exist normalize the same way as existing ones.
pub fn normalize_with(path: impl AsRef<Path>, policy: SymlinkPolicy) -> PathBuf {
    let cleaned = absolutize(path.as_ref()).clean();
    let resolved = match policy {
        SymlinkPolicy::Preserve => cleaned,
        SymlinkPolicy::Resolve => cleaned.canonicalize().unwrap_or(cleaned),
    };
    fold_case(resolved)
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(windows)]
fn fold_case(path: PathBuf) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}

#[cfg(not(windows))]
fn fold_case(path: PathBuf) -> PathBuf {
    path
}

/// Splits `path` into its root (drive prefix and/or root directory) and the
/// root-relative remainder.
pub fn split_root(path: &Path) -> (PathBuf, PathBuf) {
    let mut root = PathBuf::new();
    let mut remainder = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => root.push(component.as_os_str()),
            other => remainder.push(other.as_os_str()),
        }
    }
    (root, remainder)
}

/// The root-relative part of `path`, keeping only its normal components.
///
/// This is both the name an entry is stored under and the key it is looked up
/// by in the archive index. The file name bytes are kept as they are.
pub fn archive_key(path: &Path) -> PathBuf {
    let (_, remainder) = split_root(path);
    remainder
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Expands a path, replacing a leading `~` or `$HOME` with the user's home
/// directory, then normalizes it.
pub fn expand_path(input: &str) -> PathBuf {
    normalize(expand_home(input))
}

fn expand_home(input: &str) -> String {
    if input.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return input.replacen('~', &home.to_string_lossy(), 1);
        }
    } else if input.starts_with("$HOME") {
        if let Some(home) = dirs::home_dir() {
            return input.replacen("$HOME", &home.to_string_lossy(), 1);
        }
    }
    input.into()
}
