//! Rule file parsing.
//!
//! A rule file is line oriented. Each non-comment line is a key followed by
//! whitespace and a remainder:
//!
//! ```text
//! # comment
//! series 3
//! compress 1
//! backup ~/documents
//! whitelist txt doc
//! blacklist exe none
//! ```
//!
//! Unknown keys and blank lines are ignored so that older files keep working
//! as the format grows. Only a malformed `series` or `compress` value is an
//! error.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::constants::{CONFIG_EXTENSION, NO_EXTENSION};
use crate::error::{BernardError, Result};
use crate::path;

const CHAR_COMMENT: char = '#';

/// The parsed contents of a rule file.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupRule {
    /// Extensions that are always included.
    pub whitelist: BTreeSet<String>,
    /// Extensions excluded unless whitelisted.
    pub blacklist: BTreeSet<String>,
    /// Archive generation. A new value addresses a new container.
    pub series: i64,
    /// Whether the container is gzip compressed.
    pub compress: bool,
    /// Files and directories to back up, in file order.
    pub targets: Vec<PathBuf>,
}

impl BackupRule {
    /// Parses the text of a rule file.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rule = BackupRule::default();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(CHAR_COMMENT) {
                continue;
            }

            let (key, remainder) = match line.split_once(char::is_whitespace) {
                Some((key, rest)) => (key, rest.trim()),
                None => (line, ""),
            };

            match key {
                "series" => rule.series = parse_integer(index + 1, key, remainder)?,
                "compress" => rule.compress = parse_integer(index + 1, key, remainder)? != 0,
                "backup" if !remainder.is_empty() => {
                    rule.targets.push(path::expand_path(remainder));
                }
                "whitelist" => rule.whitelist.extend(remainder.split_whitespace().map(extension_token)),
                "blacklist" => rule.blacklist.extend(remainder.split_whitespace().map(extension_token)),
                _ => {}
            }
        }

        Ok(rule)
    }

    /// Reads and parses the rule file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| BernardError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}

impl FromStr for BackupRule {
    type Err = BernardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Returns the rule file path for the backup called `name` inside `dir`.
pub fn rule_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{CONFIG_EXTENSION}"))
}

fn parse_integer(line: usize, key: &str, value: &str) -> Result<i64> {
    value.parse().map_err(|_| BernardError::ConfigFormat {
        line,
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Canonical form of an extension token: lowercase, without a leading dot.
pub(crate) fn extension_token(token: &str) -> String {
    let token = token.trim_start_matches('.');
    if token.is_empty() {
        NO_EXTENSION.to_string()
    } else {
        token.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let rule = BackupRule::parse("").unwrap();
        assert_eq!(rule, BackupRule::default());
        assert_eq!(rule.series, 0);
        assert!(!rule.compress);
        assert!(rule.whitelist.is_empty());
        assert!(rule.blacklist.is_empty());
        assert!(rule.targets.is_empty());

        let rule = BackupRule::parse("# only\n   # comments\n\n").unwrap();
        assert_eq!(rule, BackupRule::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_targets_and_series() {
        let text = "series 1\nbackup /home\nbackup /etc\nbackup /var/test.log\n";
        let rule: BackupRule = text.parse().unwrap();
        assert_eq!(rule.series, 1);
        assert_eq!(
            rule.targets,
            vec![
                PathBuf::from("/home"),
                PathBuf::from("/etc"),
                PathBuf::from("/var/test.log")
            ]
        );
        assert!(!rule.compress);
    }

    #[cfg(unix)]
    #[test]
    fn test_backup_path_is_normalized() {
        let rule = BackupRule::parse("backup   /srv//data/./old/../new/  ").unwrap();
        assert_eq!(rule.targets, vec![PathBuf::from("/srv/data/new")]);
    }

    #[test]
    fn test_lists_extend() {
        let text = "whitelist txt doc\nwhitelist .MD\nblacklist exe\tavi none\n";
        let rule = BackupRule::parse(text).unwrap();
        assert_eq!(rule.whitelist, set(&["doc", "md", "txt"]));
        assert_eq!(rule.blacklist, set(&["avi", "exe", "none"]));
    }

    #[test]
    fn test_compress() {
        assert!(BackupRule::parse("compress 1").unwrap().compress);
        assert!(BackupRule::parse("compress 7").unwrap().compress);
        assert!(!BackupRule::parse("compress 0").unwrap().compress);
    }

    #[test]
    fn test_unknown_and_partial_lines_ignored() {
        let text = "retention 5\nbackup\nwhitelist\nfoo bar baz\n  series   4  \n";
        let rule = BackupRule::parse(text).unwrap();
        assert_eq!(rule.series, 4);
        assert!(rule.targets.is_empty());
        assert!(rule.whitelist.is_empty());
    }

    #[test]
    fn test_comment_only_at_line_start() {
        let rule = BackupRule::parse("  # series 9\nseries 2").unwrap();
        assert_eq!(rule.series, 2);
    }

    #[test]
    fn test_malformed_numbers() {
        let err = BackupRule::parse("backup /tmp\nseries two").unwrap_err();
        match err {
            BernardError::ConfigFormat { line, key, value } => {
                assert_eq!(line, 2);
                assert_eq!(key, "series");
                assert_eq!(value, "two");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            BackupRule::parse("compress yes"),
            Err(BernardError::ConfigFormat { .. })
        ));
        assert!(matches!(
            BackupRule::parse("series"),
            Err(BernardError::ConfigFormat { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BackupRule::load(&dir.path().join("nope.bernard")).unwrap_err();
        assert!(matches!(err, BernardError::ConfigRead { .. }));
    }

    #[test]
    fn test_rule_file() {
        let file = rule_file(Path::new("/cfg"), "test2");
        assert_eq!(file, Path::new("/cfg").join("test2.bernard"));
    }

    #[test]
    fn test_serialize_toml() {
        let rule = BackupRule::parse("series 3\ncompress 1\nwhitelist txt").unwrap();
        let text = toml::to_string(&rule).unwrap();
        assert!(text.contains("series = 3"));
        assert!(text.contains("compress = true"));
        assert!(text.contains("\"txt\""));
    }
}
