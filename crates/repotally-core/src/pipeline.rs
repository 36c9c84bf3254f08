//! Shared plumbing for the two report workflows.
//!
//! Both workflows run their stages strictly in sequence and report progress
//! through a caller-supplied `on_event` callback, so the CLI can drive a
//! spinner without the core knowing about terminals.

use serde::Serialize;
use thiserror::Error;

use crate::category::CategoryError;
use crate::drive::DriveError;
use crate::error::ConfigError;
use crate::http::ApiError;
use crate::mail::MailError;
use crate::manifest::ManifestError;
use crate::record::Source;
use crate::report::ReportError;

/// Errors that abort a workflow.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The manifest could not be read.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Repositories did not map cleanly onto categories.
    #[error(transparent)]
    Category(#[from] CategoryError),

    /// The report could not be written.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// The report mail could not be sent.
    #[error(transparent)]
    Mail(#[from] MailError),

    /// Publishing to Drive failed.
    #[error(transparent)]
    Drive(#[from] DriveError),

    /// A source was requested without a client for it.
    #[error("{0} was requested but no {0} client is configured")]
    MissingSource(Source),
}

/// Result alias for workflows.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Workflow stages, in the order they can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Look up contributor display names.
    Roster,
    /// Fetch records from a source.
    Fetch(Source),
    /// Aggregate records by contributor.
    Tally,
    /// Read the release manifest.
    Manifest,
    /// Map repositories onto categories.
    Categorize,
    /// Write the report.
    Write,
    /// Mail the report.
    Mail,
    /// Publish the report to Drive.
    Upload,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Roster => write!(f, "resolving contributors"),
            Self::Fetch(source) => write!(f, "fetching {source} records"),
            Self::Tally => write!(f, "tallying"),
            Self::Manifest => write!(f, "reading manifest"),
            Self::Categorize => write!(f, "categorizing repos"),
            Self::Write => write!(f, "writing report"),
            Self::Mail => write!(f, "mailing report"),
            Self::Upload => write!(f, "uploading report"),
        }
    }
}

/// Progress notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A stage has started.
    Started(Stage),
    /// A stage has finished, with a one-line summary.
    Finished(Stage, String),
    /// A stage was not run.
    Skipped(Stage, String),
}
