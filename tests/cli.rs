use assert_cmd::prelude::*;
use assert_fs::fixture::*;
use assert_fs::assert::PathAssert;
use predicates::prelude::*;
use std::process::Command;

fn bernard(dir: &assert_fs::TempDir) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("bernard")?;
    cmd.arg("-C").arg(dir.path());
    Ok(cmd)
}

#[test]
fn backup_streams_status_then_summary() -> Result<(), Box<dyn std::error::Error>> {
    let work = assert_fs::TempDir::new()?;
    let data = assert_fs::TempDir::new()?;
    data.child("notes.txt").write_str("A test\nActual content")?;
    data.child("nested/todo.txt").write_str("More content")?;
    data.child("setup.exe").write_str("binary")?;
    work.child("docs.bernard").write_str(&format!(
        "# sample\nseries 1\nbackup {}\nblacklist exe\n",
        data.path().display()
    ))?;

    bernard(&work)?
        .args(["backup", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("++\n"))
        .stdout(predicate::str::contains("docs-1.tar: 2 added, 0 unchanged, 0 errors"));
    work.child("docs-1.tar").assert(predicate::path::is_file());

    bernard(&work)?
        .args(["backup", "docs", "--paths"])
        .assert()
        .success()
        .stdout(predicate::str::contains(". "))
        .stdout(predicate::str::contains("notes.txt"))
        .stdout(predicate::str::contains("0 added, 2 unchanged"));

    bernard(&work)?
        .args(["list", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nested/todo.txt"))
        .stdout(predicate::str::contains("setup.exe").not());
    Ok(())
}

#[test]
fn multiple_backups_run_together() -> Result<(), Box<dyn std::error::Error>> {
    let work = assert_fs::TempDir::new()?;
    let data = assert_fs::TempDir::new()?;
    data.child("a.txt").write_str("a")?;
    let rule = format!("backup {}\n", data.path().display());
    work.child("one.bernard").write_str(&rule)?;
    work.child("two.bernard").write_str(&format!("compress 1\n{rule}"))?;

    bernard(&work)?
        .args(["backup", "one", "two"])
        .assert()
        .success()
        .stdout(predicate::str::contains("one-0.tar: 1 added"))
        .stdout(predicate::str::contains("two-0.tar.gz: 1 added"));
    Ok(())
}

#[test]
fn missing_rule_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let work = assert_fs::TempDir::new()?;
    bernard(&work)?
        .args(["backup", "nothing"])
        .assert()
        .failure()
        .code(66)
        .stderr(predicate::str::contains("nothing.bernard"));
    Ok(())
}

#[test]
fn malformed_series_fails_before_backup() -> Result<(), Box<dyn std::error::Error>> {
    let work = assert_fs::TempDir::new()?;
    work.child("bad.bernard").write_str("series one\n")?;
    bernard(&work)?
        .args(["backup", "bad"])
        .assert()
        .failure()
        .code(78)
        .stderr(predicate::str::contains("series"));
    work.child("bad-0.tar").assert(predicate::path::missing());
    Ok(())
}

#[test]
fn config_prints_parsed_rule() -> Result<(), Box<dyn std::error::Error>> {
    let work = assert_fs::TempDir::new()?;
    work.child("cfg.bernard")
        .write_str("series 3\ncompress 1\nwhitelist .TXT doc\nunknown key\n")?;
    bernard(&work)?
        .args(["config", "cfg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("series = 3"))
        .stdout(predicate::str::contains("compress = true"))
        .stdout(predicate::str::contains("\"txt\""));
    Ok(())
}

#[test]
fn restore_is_not_implemented() -> Result<(), Box<dyn std::error::Error>> {
    let work = assert_fs::TempDir::new()?;
    bernard(&work)?
        .args(["restore", "docs"])
        .assert()
        .failure()
        .code(69)
        .stderr(predicate::str::contains("not implemented"));
    Ok(())
}

#[test]
fn usage_errors() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("bernard")?
        .assert()
        .failure()
        .code(64)
        .stderr(predicate::str::contains("--help"));

    Command::cargo_bin("bernard")?
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));

    Command::cargo_bin("bernard")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("backup"));
    Ok(())
}
