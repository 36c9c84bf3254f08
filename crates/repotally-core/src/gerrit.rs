//! Gerrit REST collaborator: account lookup and merged changes.

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::http::{ApiResult, Auth, HttpClient, decode_json};
use crate::ini::Credentials;
use crate::record::{ActivityRecord, AuthorRef, RecordStream};
use crate::roster::Roster;
use crate::window::TimestampFormat;

/// Gerrit prefixes every JSON body with this to defeat XSSI.
const XSSI_PREFIX: &str = ")]}'";

/// An account returned by the suggest endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GerritAccount {
    /// Primary email, if visible to the caller.
    #[serde(default)]
    pub email: Option<String>,
    /// Full name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A change as returned by the change query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GerritChange {
    /// The `I…` change id.
    pub change_id: String,
    /// Project the change belongs to.
    pub project: String,
    /// First line of the commit message.
    pub subject: String,
    /// Creation timestamp, `YYYY-MM-DD HH:MM:SS.fffffffff` UTC.
    pub created: String,
    /// Numeric change number.
    #[serde(rename = "_number", default)]
    pub number: Option<u64>,
}

/// The Gerrit endpoints the tally needs.
pub trait GerritApi {
    /// Accounts matching a free-text query (email, name).
    fn suggest_accounts(&self, query: &str) -> ApiResult<Vec<GerritAccount>>;

    /// Merged changes owned by the given account email, newest first.
    fn merged_changes(&self, owner: &str) -> ApiResult<Vec<GerritChange>>;

    /// Web link for a change, when the server address is known.
    fn change_url(&self, _change: &GerritChange) -> Option<String> {
        None
    }
}

/// [`GerritApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct GerritClient {
    http: HttpClient,
    base_url: String,
    auth: Auth,
}

impl GerritClient {
    /// Client for the server named in a credentials file.
    pub fn new(http: HttpClient, credentials: &Credentials) -> Self {
        Self::with_auth(
            http,
            &credentials.base_url,
            Auth::basic(&credentials.username, &credentials.password),
        )
    }

    /// Client with explicit auth. Anonymous clients skip the `/a/` prefix.
    pub fn with_auth(http: HttpClient, base_url: &str, auth: Auth) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        if self.auth.is_authenticated() {
            format!("{}/a/{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn get<T: serde::de::DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> ApiResult<T> {
        let text = self.http.get_text(url, query, &self.auth)?;
        decode_json(url, strip_xssi(&text))
    }
}

impl GerritApi for GerritClient {
    #[instrument(skip(self))]
    fn suggest_accounts(&self, query: &str) -> ApiResult<Vec<GerritAccount>> {
        let url = self.endpoint("accounts/?suggest");
        self.get(&url, &[("q", query)])
    }

    #[instrument(skip(self))]
    fn merged_changes(&self, owner: &str) -> ApiResult<Vec<GerritChange>> {
        let url = self.endpoint("changes/");
        let query = format!("status:merged owner:{owner}");
        let changes: Vec<GerritChange> = self.get(&url, &[("q", &query)])?;
        debug!(owner, changes = changes.len(), "merged changes fetched");
        Ok(changes)
    }

    fn change_url(&self, change: &GerritChange) -> Option<String> {
        change
            .number
            .map(|n| format!("{}/c/{}/+/{n}", self.base_url, change.project))
    }
}

fn strip_xssi(body: &str) -> &str {
    body.trim_start()
        .strip_prefix(XSSI_PREFIX)
        .unwrap_or(body)
}

/// Build the Gerrit roster: configured email to account full name.
///
/// An email the server does not recognise keeps itself as display name.
#[instrument(skip_all, fields(users = emails.len()))]
pub fn gerrit_roster(api: &dyn GerritApi, emails: &[String]) -> ApiResult<Roster> {
    let mut roster = Roster::new();
    for email in emails {
        let accounts = api.suggest_accounts(email)?;
        let name = accounts
            .into_iter()
            .find(|a| a.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            .and_then(|a| a.name)
            .unwrap_or_else(|| email.clone());
        roster.insert(email.clone(), name);
    }
    info!(members = roster.len(), "gerrit roster resolved");
    Ok(roster)
}

/// One stream of merged changes per roster member.
#[instrument(skip_all, fields(members = roster.len()))]
pub fn gerrit_streams(api: &dyn GerritApi, roster: &Roster) -> ApiResult<Vec<RecordStream>> {
    roster
        .iter()
        .map(|(email, _)| {
            let records = api
                .merged_changes(email)?
                .into_iter()
                .map(|change| ActivityRecord {
                    url: api.change_url(&change),
                    id: change.change_id,
                    author: AuthorRef::Explicit {
                        identity: email.to_string(),
                        name: None,
                    },
                    timestamp: change.created,
                    project: change.project,
                    message: change.subject,
                })
                .collect();
            Ok(RecordStream::new(
                format!("gerrit owner:{email}"),
                TimestampFormat::Gerrit,
                records,
            ))
        })
        .collect()
}
