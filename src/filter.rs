use std::collections::BTreeSet;
use std::path::Path;

use crate::config::{BackupRule, extension_token};
use crate::constants::NO_EXTENSION;

/// Decides per path whether a file is backed up, based on its extension.
///
/// The decision is, in order:
/// 1. no whitelist: include unless blacklisted;
/// 2. no blacklist: include only if whitelisted;
/// 3. both: include if whitelisted or not blacklisted.
///
/// In the third case a whitelist entry always wins, so listing the same
/// extension in both lists has the effect of only whitelisting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
}

impl ExtensionFilter {
    pub fn new(whitelist: BTreeSet<String>, blacklist: BTreeSet<String>) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }

    pub fn from_rule(rule: &BackupRule) -> Self {
        Self::new(rule.whitelist.clone(), rule.blacklist.clone())
    }

    /// Returns true if `path` should be backed up.
    pub fn accepts(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        if self.whitelist.is_empty() {
            return !self.blacklist.contains(&ext);
        }
        if self.blacklist.is_empty() {
            return self.whitelist.contains(&ext);
        }
        self.whitelist.contains(&ext) || !self.blacklist.contains(&ext)
    }
}

impl From<&BackupRule> for ExtensionFilter {
    fn from(rule: &BackupRule) -> Self {
        Self::from_rule(rule)
    }
}

/// Lowercased extension of the file name, or `none`.
///
/// Leading dots of hidden files do not count, so `.bashrc` has no extension.
pub fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => extension_token(&ext.to_string_lossy()),
        _ => NO_EXTENSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(white: &[&str], black: &[&str]) -> ExtensionFilter {
        ExtensionFilter::new(
            white.iter().map(|s| s.to_string()).collect(),
            black.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn accepts(f: &ExtensionFilter, name: &str) -> bool {
        f.accepts(Path::new(name))
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/a/b/notes.TXT")), "txt");
        assert_eq!(extension_of(Path::new("archive.tar.gz")), "gz");
        assert_eq!(extension_of(Path::new("Makefile")), "none");
        assert_eq!(extension_of(Path::new(".bashrc")), "none");
        assert_eq!(extension_of(Path::new("trailing.")), "none");
        assert_eq!(extension_of(Path::new("dir.d/file")), "none");
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let f = ExtensionFilter::default();
        for name in ["a.txt", "b.exe", "noext", ".hidden"] {
            assert!(accepts(&f, name), "{name}");
        }
    }

    #[test]
    fn test_blacklist_only() {
        for ext in ["exe", "avi", "none", "txt"] {
            let f = filter(&[], &[ext]);
            let rejected = if ext == "none" {
                "file".to_string()
            } else {
                format!("file.{ext}")
            };
            assert!(!accepts(&f, &rejected), "{rejected}");
            assert!(accepts(&f, "other.dat"));
            if ext != "none" {
                assert!(accepts(&f, "noext"));
            }
        }
    }

    #[test]
    fn test_whitelist_only() {
        for ext in ["txt", "doc", "none"] {
            let f = filter(&[ext], &[]);
            let accepted = if ext == "none" {
                "README".to_string()
            } else {
                format!("file.{ext}")
            };
            assert!(accepts(&f, &accepted), "{accepted}");
            assert!(!accepts(&f, "other.dat"));
        }
    }

    #[test]
    fn test_whitelist_wins_over_blacklist() {
        let f = filter(&["txt"], &["txt", "exe"]);
        assert!(accepts(&f, "notes.txt"));
        assert!(!accepts(&f, "setup.exe"));
        // Neither listed: only the blacklist prunes, so it stays in.
        assert!(accepts(&f, "movie.avi"));
    }

    #[test]
    fn test_sample_rule() {
        let rule = BackupRule::parse("whitelist txt doc\nblacklist exe avi none").unwrap();
        let f = ExtensionFilter::from(&rule);
        assert!(!accepts(&f, "noextension"));
        assert!(!accepts(&f, "foo.exe"));
        assert!(!accepts(&f, "example.avi"));
        assert!(accepts(&f, "test.txt"));
        assert!(accepts(&f, "potato.doc"));
        assert!(accepts(&f, "POTATO.DOC"));
    }
}
