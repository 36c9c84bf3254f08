//! Plain-text reports and where they are written.

use std::fmt::{self, Write as _};
use std::io::Write as _;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::category::CategorizedRepos;
use crate::record::Source;
use crate::tally::Tally;

/// A tally together with the source it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTally {
    /// Source of the records.
    pub source: Source,
    /// The aggregation result.
    pub tally: Tally,
}

/// Render the commit tally report.
///
/// Blocks follow the order of `sections`; contributors follow roster order.
pub fn render_commit_report(sections: &[SourceTally]) -> String {
    let mut out = String::new();
    for SourceTally { source, tally } in sections {
        for entry in &tally.entries {
            let repos: Vec<&str> = entry.repos.iter().map(String::as_str).collect();
            let _ = writeln!(out, "=== {} ({source}) ===", entry.display_name);
            let _ = writeln!(out, "Total Commit(s): {}", entry.total);
            if repos.is_empty() {
                out.push_str("Repo(s):\n");
            } else {
                let _ = writeln!(out, "Repo(s): {}", repos.join(", "));
            }
            let _ = writeln!(out, "Commit Messages:");
            for message in &entry.messages {
                let _ = writeln!(out, "{message}");
            }
            out.push('\n');
        }

        if !tally.unattributed.is_empty() {
            let _ = writeln!(out, "=== Unattributed ({source}) ===");
            for record in &tally.unattributed {
                let _ = write!(out, "{} -- {}", record.id, record.reason);
                if let Some(url) = &record.url {
                    let _ = write!(out, " {url}");
                }
                out.push('\n');
            }
            out.push('\n');
        }
    }
    out
}

/// Render the private-repo report, one section per category.
pub fn render_category_report(grouped: &CategorizedRepos) -> String {
    let mut out = String::new();
    for (category, urls) in grouped {
        let _ = writeln!(out, "=== {category} ===");
        for url in urls {
            let _ = writeln!(out, "{url}");
        }
        out.push('\n');
    }
    out
}

/// Errors from writing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The destination could not be written.
    #[error("unable to write report to {target}: {source}")]
    Write {
        /// `stdout` or the file path.
        target: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Where a report goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSink {
    /// Standard output (`-`).
    Stdout,
    /// A file, overwritten.
    File(Utf8PathBuf),
}

impl ReportSink {
    /// Write the whole report.
    #[instrument(skip(text), fields(bytes = text.len()))]
    pub fn write(&self, text: &str) -> Result<(), ReportError> {
        let result = match self {
            Self::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush())
            }
            Self::File(path) => std::fs::write(path, text),
        };
        result.map_err(|source| ReportError::Write {
            target: self.to_string(),
            source,
        })?;
        debug!(sink = %self, "report written");
        Ok(())
    }

    /// The file path, if the sink is a file.
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Stdout => None,
            Self::File(path) => Some(path),
        }
    }
}

impl FromStr for ReportSink {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == "-" {
            Self::Stdout
        } else {
            Self::File(Utf8PathBuf::from(s))
        })
    }
}

impl fmt::Display for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::File(path) => write!(f, "{path}"),
        }
    }
}
