//! Date-windowed commit aggregation.
//!
//! [`tally`] walks every record of every stream, keeps the ones inside the
//! [`DateWindow`], resolves each to a roster identity and groups by that
//! identity. Nothing is dropped silently: records with unparseable
//! timestamps end up in [`Tally::skipped`], records that cannot be tied to a
//! roster member end up in [`Tally::unattributed`].
//!
//! Sources are expected to return records newest first. That ordering is
//! checked, not trusted: a stream whose ages go backwards is reported in
//! [`Tally::out_of_order`] and is still counted in full.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::record::{ActivityRecord, AuthorRef, RecordStream};
use crate::roster::Roster;
use crate::window::DateWindow;

/// Per-contributor result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorTally {
    /// Roster identity.
    pub identity: String,
    /// Display name, looked up at the end.
    pub display_name: String,
    /// Records attributed to this contributor inside the window.
    pub total: usize,
    /// Distinct projects touched, sorted.
    pub repos: BTreeSet<String>,
    /// `<id> -- <message>` lines in encounter order.
    pub messages: Vec<String>,
}

/// Why a record could not be attributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnattributedReason {
    /// The source carried no author at all.
    NoAuthor,
    /// An identity was present but is not on the roster, and no name matched.
    UnknownIdentity(String),
    /// Only a name was present and it matched no roster member.
    UnknownName(String),
}

impl std::fmt::Display for UnattributedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthor => f.write_str("no author information"),
            Self::UnknownIdentity(id) => write!(f, "identity {id} is not configured"),
            Self::UnknownName(name) => write!(f, "author name {name:?} matches no configured user"),
        }
    }
}

/// A record inside the window that no roster member claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unattributed {
    /// Label of the stream it came from.
    pub stream: String,
    /// Record id.
    pub id: String,
    /// Web link, when known.
    pub url: Option<String>,
    /// Resolution failure.
    pub reason: UnattributedReason,
}

/// A record whose timestamp could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    /// Label of the stream it came from.
    pub stream: String,
    /// Record id.
    pub id: String,
    /// The raw timestamp.
    pub timestamp: String,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// One entry per roster member, in roster order, zero counts included.
    pub entries: Vec<ContributorTally>,
    /// In-window records not tied to any roster member.
    pub unattributed: Vec<Unattributed>,
    /// Records dropped because their timestamp did not parse.
    pub skipped: Vec<Skipped>,
    /// Labels of streams that were not sorted newest first.
    pub out_of_order: Vec<String>,
}

impl Tally {
    /// Sum of attributed records.
    pub fn attributed_total(&self) -> usize {
        self.entries.iter().map(|e| e.total).sum()
    }

    /// Attributed plus unattributed: every parseable record in the window.
    pub fn in_window_total(&self) -> usize {
        self.attributed_total() + self.unattributed.len()
    }
}

#[derive(Default)]
struct Bucket {
    total: usize,
    repos: BTreeSet<String>,
    messages: Vec<String>,
}

/// Aggregate record streams into a per-contributor [`Tally`].
#[instrument(skip_all, fields(days = window.days, streams = streams.len(), roster = roster.len()))]
pub fn tally(streams: &[RecordStream], window: &DateWindow, roster: &Roster) -> Tally {
    let mut buckets: HashMap<&str, Bucket> = HashMap::new();
    let mut unattributed = Vec::new();
    let mut skipped = Vec::new();
    let mut out_of_order = Vec::new();

    for stream in streams {
        let mut newest_age: Option<i64> = None;
        let mut flagged = false;

        for record in &stream.records {
            let Some(at) = stream.format.parse(&record.timestamp) else {
                warn!(
                    stream = %stream.label,
                    id = %record.id,
                    timestamp = %record.timestamp,
                    "unparseable timestamp, skipping record"
                );
                skipped.push(Skipped {
                    stream: stream.label.clone(),
                    id: record.id.clone(),
                    timestamp: record.timestamp.clone(),
                });
                continue;
            };

            let age = window.age_days(at);
            if let Some(previous) = newest_age
                && age < previous
                && !flagged
            {
                warn!(
                    stream = %stream.label,
                    id = %record.id,
                    "records are not sorted newest first; counting the full stream"
                );
                out_of_order.push(stream.label.clone());
                flagged = true;
            }
            newest_age = Some(newest_age.map_or(age, |previous| previous.max(age)));

            if !window.includes_age(age) {
                continue;
            }

            match resolve(record, roster) {
                Ok(identity) => {
                    let bucket = buckets.entry(identity).or_default();
                    bucket.total += 1;
                    bucket.repos.insert(record.project.clone());
                    bucket.messages.push(record.summary_line());
                }
                Err(reason) => {
                    warn!(stream = %stream.label, id = %record.id, %reason, "unattributed record");
                    unattributed.push(Unattributed {
                        stream: stream.label.clone(),
                        id: record.id.clone(),
                        url: record.url.clone(),
                        reason,
                    });
                }
            }
        }
    }

    let entries: Vec<ContributorTally> = roster
        .iter()
        .map(|(identity, display_name)| {
            let bucket = buckets.remove(identity).unwrap_or_default();
            ContributorTally {
                identity: identity.to_string(),
                display_name: display_name.to_string(),
                total: bucket.total,
                repos: bucket.repos,
                messages: bucket.messages,
            }
        })
        .collect();

    let result = Tally {
        entries,
        unattributed,
        skipped,
        out_of_order,
    };
    debug!(
        attributed = result.attributed_total(),
        unattributed = result.unattributed.len(),
        skipped = result.skipped.len(),
        "tally complete"
    );
    result
}

/// Resolve a record to a roster identity.
fn resolve<'r>(record: &ActivityRecord, roster: &'r Roster) -> Result<&'r str, UnattributedReason> {
    match &record.author {
        AuthorRef::Explicit { identity, name } => {
            if let Some(member) = roster.identity(identity) {
                return Ok(member);
            }
            name.as_deref()
                .and_then(|n| roster.resolve_name(n))
                .ok_or_else(|| UnattributedReason::UnknownIdentity(identity.clone()))
        }
        AuthorRef::Named(name) => roster
            .resolve_name(name)
            .ok_or_else(|| UnattributedReason::UnknownName(name.clone())),
        AuthorRef::Unknown => Err(UnattributedReason::NoAuthor),
    }
}
