//! Git host (GitHub-compatible) REST collaborator: commit listings.

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::RepoRef;
use crate::http::{ApiResult, Auth, HttpClient};
use crate::ini::Credentials;
use crate::record::{ActivityRecord, AuthorRef, RecordStream};
use crate::window::TimestampFormat;

/// One entry of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitCommit {
    /// Commit sha.
    pub sha: String,
    /// Linked host account; `null` when the author email maps to no account.
    #[serde(default)]
    pub author: Option<GitAccount>,
    /// Raw git commit data.
    pub commit: GitCommitData,
    /// Web link to the commit.
    #[serde(default)]
    pub html_url: Option<String>,
}

/// The host account linked to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitAccount {
    /// Numeric login id.
    pub id: u64,
    /// Login name.
    #[serde(default)]
    pub login: Option<String>,
}

/// The git-level part of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitCommitData {
    /// Author signature.
    pub author: GitSignature,
    /// Full commit message.
    pub message: String,
}

/// Name and date of a git signature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitSignature {
    /// Author name as written in the commit.
    #[serde(default)]
    pub name: Option<String>,
    /// RFC 3339 author date.
    pub date: String,
}

/// The Git host endpoints the tally needs.
pub trait GitHostApi {
    /// Latest commits of a repository, newest first.
    fn list_commits(&self, repo: &RepoRef, per_page: u32) -> ApiResult<Vec<GitCommit>>;
}

/// [`GitHostApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct GitHostClient {
    http: HttpClient,
    api_url: String,
    auth: Auth,
}

impl GitHostClient {
    /// Client for the API named in a credentials file.
    pub fn new(http: HttpClient, credentials: &Credentials) -> Self {
        Self {
            http,
            api_url: credentials.base_url.trim_end_matches('/').to_string(),
            auth: Auth::basic(&credentials.username, &credentials.password),
        }
    }
}

impl GitHostApi for GitHostClient {
    #[instrument(skip(self), fields(repo = %repo))]
    fn list_commits(&self, repo: &RepoRef, per_page: u32) -> ApiResult<Vec<GitCommit>> {
        let url = format!("{}/repos/{}/{}/commits", self.api_url, repo.owner, repo.name);
        let per_page = per_page.to_string();
        let commits: Vec<GitCommit> =
            self.http
                .get_json(&url, &[("per_page", per_page.as_str())], &self.auth)?;
        debug!(commits = commits.len(), "commit listing fetched");
        Ok(commits)
    }
}

impl GitCommit {
    /// Translate into the aggregator's record shape.
    ///
    /// A linked account wins; otherwise the commit's author name is kept for
    /// name resolution.
    pub fn into_record(self, repo: &RepoRef) -> ActivityRecord {
        let name = self
            .commit
            .author
            .name
            .filter(|n| !n.trim().is_empty());
        let author = match (self.author, name) {
            (Some(account), name) => AuthorRef::Explicit {
                identity: account.id.to_string(),
                name,
            },
            (None, Some(name)) => AuthorRef::Named(name),
            (None, None) => AuthorRef::Unknown,
        };
        let subject = self.commit.message.lines().next().unwrap_or_default().to_string();

        ActivityRecord {
            id: self.sha,
            author,
            timestamp: self.commit.author.date,
            project: repo.to_string(),
            message: subject,
            url: self.html_url,
        }
    }
}

/// One stream per repository.
#[instrument(skip_all, fields(repos = repos.len(), per_page))]
pub fn git_streams(api: &dyn GitHostApi, repos: &[RepoRef], per_page: u32) -> ApiResult<Vec<RecordStream>> {
    repos
        .iter()
        .map(|repo| {
            let records = api
                .list_commits(repo, per_page)?
                .into_iter()
                .map(|commit| commit.into_record(repo))
                .collect();
            Ok(RecordStream::new(repo.to_string(), TimestampFormat::GitHub, records))
        })
        .collect()
}
