use std::fmt;
use std::io::{self, Write};

use crate::outcome::{Action, FileOutcome};

/// How outcomes are rendered to the status stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Style {
    /// One symbol per file on a single line.
    #[default]
    Symbols,
    /// One `<symbol> <path>` line per file.
    Paths,
    /// Nothing per file; only the summary is kept.
    Quiet,
}

/// Totals of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub archive: String,
    pub added: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl Summary {
    pub fn new(archive: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, action: Action) {
        match action {
            Action::Added => self.added += 1,
            Action::Unchanged => self.unchanged += 1,
            Action::Error => self.errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.added + self.unchanged + self.errors
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} added, {} unchanged, {} errors",
            self.archive, self.added, self.unchanged, self.errors
        )
    }
}

/// Streams outcomes to `out` as they arrive.
pub struct Reporter<W: Write> {
    out: W,
    style: Style,
    summary: Summary,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, style: Style, archive: impl Into<String>) -> Self {
        Self {
            out,
            style,
            summary: Summary::new(archive),
        }
    }

    pub fn record(&mut self, outcome: &FileOutcome) -> io::Result<()> {
        self.summary.record(outcome.action);
        match self.style {
            Style::Symbols => {
                write!(self.out, "{}", outcome.action.symbol())?;
                self.out.flush()
            }
            Style::Paths => writeln!(self.out, "{outcome}"),
            Style::Quiet => Ok(()),
        }
    }

    /// Terminates the symbol line and returns the totals.
    pub fn finish(mut self) -> io::Result<Summary> {
        if self.style == Style::Symbols && self.summary.total() > 0 {
            writeln!(self.out)?;
        }
        self.out.flush()?;
        Ok(self.summary)
    }
}
