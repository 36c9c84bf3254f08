//! Commit and change records as the aggregator sees them.
//!
//! Both REST collaborators translate their JSON into [`ActivityRecord`]s
//! grouped into [`RecordStream`]s, one stream per API call, so the
//! aggregator never touches source-specific shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::window::TimestampFormat;

/// A system commits are tallied from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Gerrit code review (merged changes).
    Gerrit,
    /// GitHub-style Git host (commit listings).
    Git,
}

impl Source {
    /// Label used in report headers.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Gerrit => "Gerrit",
            Self::Git => "Git",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who a record claims to be from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AuthorRef {
    /// Authenticated identity supplied by the source (email, login id).
    ///
    /// `name` is the free-text author name, when the source also has one,
    /// used as a fallback if the identity is not on the roster.
    Explicit {
        /// Stable identity key.
        identity: String,
        /// Free-text author name, if any.
        name: Option<String>,
    },
    /// Only a free-text author name is available.
    Named(String),
    /// Nothing usable.
    Unknown,
}

/// A single commit or change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityRecord {
    /// Change id or commit sha.
    pub id: String,
    /// Author as reported by the source.
    pub author: AuthorRef,
    /// Creation timestamp, unparsed; the owning stream knows the format.
    pub timestamp: String,
    /// Project or `owner/repo` the record belongs to.
    pub project: String,
    /// Subject line or full commit message.
    pub message: String,
    /// Web link to the record, when the source has one.
    pub url: Option<String>,
}

impl ActivityRecord {
    /// The `<id> -- <message>` line written to reports.
    pub fn summary_line(&self) -> String {
        format!("{} -- {}", self.id, self.message.trim_end())
    }
}

/// Records returned by one API call, expected newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStream {
    /// Where the stream came from (an owner query, a repository).
    pub label: String,
    /// Timestamp format used by every record in the stream.
    pub format: TimestampFormat,
    /// The records, in the order the source returned them.
    pub records: Vec<ActivityRecord>,
}

impl RecordStream {
    /// Create a stream.
    pub fn new(label: impl Into<String>, format: TimestampFormat, records: Vec<ActivityRecord>) -> Self {
        Self {
            label: label.into(),
            format,
            records,
        }
    }
}
