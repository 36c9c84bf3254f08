//! Commit tally workflow.
//!
//! For each requested source: resolve the roster, fetch record streams,
//! aggregate them over the date window. The per-source tallies are rendered
//! into one report, written to the sink and optionally mailed.

use tracing::{info, instrument, warn};

use crate::config::{RepoRef, RosterSource};
use crate::error::{ConfigError, ConfigResult};
use crate::gerrit::{GerritApi, gerrit_roster, gerrit_streams};
use crate::github::{GitHostApi, git_streams};
use crate::ini::ProjectsConfig;
use crate::mail::{MailTransport, OutgoingMail};
use crate::pipeline::{PipelineError, PipelineEvent, PipelineResult, Stage};
use crate::record::{RecordStream, Source};
use crate::report::{ReportSink, SourceTally, render_commit_report};
use crate::roster::Roster;
use crate::tally::{Tally, tally};
use crate::window::DateWindow;

/// Who is tallied, per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identities {
    /// Gerrit account emails; display names are looked up on the server.
    pub gerrit_users: Vec<String>,
    /// Git host login id to display name.
    pub git_roster: Roster,
}

impl Identities {
    /// Pick identities from the projects file or the inline app config.
    pub fn from_config(source: &RosterSource, projects: Option<&ProjectsConfig>) -> ConfigResult<Self> {
        match source {
            RosterSource::ProjectsFile => {
                let projects = projects.ok_or_else(|| ConfigError::InvalidValue {
                    key: "tally.identities".to_string(),
                    message: "identities come from the projects file, but none was loaded".to_string(),
                })?;
                Ok(Self {
                    gerrit_users: projects.gerrit_users.clone(),
                    git_roster: projects.git_users.clone(),
                })
            }
            RosterSource::Inline {
                gerrit_users,
                git_users,
            } => Ok(Self {
                gerrit_users: gerrit_users.clone(),
                git_roster: git_users
                    .iter()
                    .map(|user| (user.id.clone(), user.name.clone()))
                    .collect(),
            }),
        }
    }
}

/// Everything the workflow needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct CommitsRequest {
    /// Sources in report order.
    pub sources: Vec<Source>,
    /// The trailing window.
    pub window: DateWindow,
    /// Who to tally.
    pub identities: Identities,
    /// Repositories scanned on the Git host.
    pub git_repos: Vec<RepoRef>,
    /// Page size for commit listings.
    pub git_per_page: u32,
    /// Where the report is written.
    pub sink: ReportSink,
    /// Mail envelope; the body is filled with the report.
    pub mail: Option<OutgoingMail>,
}

/// External services, any of which may be absent.
#[derive(Clone, Copy, Default)]
pub struct CommitClients<'a> {
    /// Gerrit, required when [`Source::Gerrit`] is requested.
    pub gerrit: Option<&'a dyn GerritApi>,
    /// Git host, required when [`Source::Git`] is requested.
    pub git: Option<&'a dyn GitHostApi>,
    /// Mail relay, required when a recipient is set.
    pub mailer: Option<&'a dyn MailTransport>,
}

/// What the workflow produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitsOutcome {
    /// Per-source tallies, in report order.
    pub sections: Vec<SourceTally>,
    /// The rendered report.
    pub report: String,
    /// Recipient the report was mailed to.
    pub mailed_to: Option<String>,
}

/// Run the commit tally workflow.
#[instrument(skip_all, fields(days = request.window.days, sources = ?request.sources))]
pub fn run_commits(
    request: CommitsRequest,
    clients: CommitClients<'_>,
    mut on_event: impl FnMut(PipelineEvent),
) -> PipelineResult<CommitsOutcome> {
    // fail before any network traffic
    if request.mail.is_some() && clients.mailer.is_none() {
        return Err(ConfigError::InvalidValue {
            key: "mail.smtp_server".to_string(),
            message: "a recipient was given but no SMTP server is configured".to_string(),
        }
        .into());
    }
    for source in &request.sources {
        let missing = match source {
            Source::Gerrit => clients.gerrit.is_none(),
            Source::Git => clients.git.is_none(),
        };
        if missing {
            return Err(PipelineError::MissingSource(*source));
        }
    }

    let mut sections = Vec::with_capacity(request.sources.len());
    for &source in &request.sources {
        let (roster, streams) = match (source, clients.gerrit, clients.git) {
            (Source::Gerrit, Some(api), _) => {
                on_event(PipelineEvent::Started(Stage::Roster));
                let roster = gerrit_roster(api, &request.identities.gerrit_users)?;
                on_event(PipelineEvent::Finished(
                    Stage::Roster,
                    format!("{} Gerrit account(s)", roster.len()),
                ));

                on_event(PipelineEvent::Started(Stage::Fetch(source)));
                let streams = gerrit_streams(api, &roster)?;
                (roster, streams)
            }
            (Source::Git, _, Some(api)) => {
                if request.git_repos.is_empty() {
                    warn!("no Git repositories configured; the Git tally will be empty");
                }
                on_event(PipelineEvent::Started(Stage::Fetch(source)));
                let streams = git_streams(api, &request.git_repos, request.git_per_page)?;
                (request.identities.git_roster.clone(), streams)
            }
            _ => return Err(PipelineError::MissingSource(source)),
        };
        on_event(PipelineEvent::Finished(
            Stage::Fetch(source),
            format!("{} record(s) from {} stream(s)", record_count(&streams), streams.len()),
        ));

        on_event(PipelineEvent::Started(Stage::Tally));
        let result = tally(&streams, &request.window, &roster);
        on_event(PipelineEvent::Finished(Stage::Tally, summarize(source, &result)));
        sections.push(SourceTally {
            source,
            tally: result,
        });
    }

    let report = render_commit_report(&sections);
    on_event(PipelineEvent::Started(Stage::Write));
    request.sink.write(&report)?;
    on_event(PipelineEvent::Finished(Stage::Write, request.sink.to_string()));

    let mailed_to = match (request.mail, clients.mailer) {
        (Some(mut mail), Some(mailer)) => {
            on_event(PipelineEvent::Started(Stage::Mail));
            mail.body.clone_from(&report);
            mailer.send(&mail)?;
            on_event(PipelineEvent::Finished(Stage::Mail, mail.to.clone()));
            Some(mail.to)
        }
        _ => {
            on_event(PipelineEvent::Skipped(Stage::Mail, "no recipient".to_string()));
            None
        }
    };

    info!(sections = sections.len(), mailed = mailed_to.is_some(), "commit tally complete");
    Ok(CommitsOutcome {
        sections,
        report,
        mailed_to,
    })
}

fn record_count(streams: &[RecordStream]) -> usize {
    streams.iter().map(|s| s.records.len()).sum()
}

fn summarize(source: Source, tally: &Tally) -> String {
    let mut summary = format!(
        "{source}: {} attributed, {} unattributed",
        tally.attributed_total(),
        tally.unattributed.len()
    );
    if !tally.skipped.is_empty() {
        summary.push_str(&format!(", {} skipped", tally.skipped.len()));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitUser;
    use crate::gerrit::{GerritAccount, GerritChange};
    use crate::github::GitCommit;
    use crate::http::ApiResult;
    use crate::mail::MailError;
    use camino::Utf8PathBuf;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;

    struct FakeGerrit;

    impl GerritApi for FakeGerrit {
        fn suggest_accounts(&self, query: &str) -> ApiResult<Vec<GerritAccount>> {
            Ok(vec![GerritAccount {
                email: Some(query.to_string()),
                name: Some("Alice Liddell".to_string()),
            }])
        }

        fn merged_changes(&self, _owner: &str) -> ApiResult<Vec<GerritChange>> {
            Ok(vec![
                GerritChange {
                    change_id: "I100".into(),
                    project: "backup".into(),
                    subject: "Fix restore".into(),
                    created: "2019-06-14 10:00:00.000000000".into(),
                    number: None,
                },
                GerritChange {
                    change_id: "I099".into(),
                    project: "backup".into(),
                    subject: "Too old".into(),
                    created: "2019-05-01 10:00:00.000000000".into(),
                    number: None,
                },
            ])
        }
    }

    struct FakeHost;

    impl GitHostApi for FakeHost {
        fn list_commits(&self, _repo: &RepoRef, _per_page: u32) -> ApiResult<Vec<GitCommit>> {
            Ok(serde_json::from_str(
                r#"[{"sha":"abc","author":{"id":42},
                     "commit":{"author":{"name":"Bob","date":"2019-06-13T08:00:00Z"},"message":"Tune\n\nbody"},
                     "html_url":"https://github.com/couchbase/backup/commit/abc"}]"#,
            )
            .unwrap())
        }
    }

    #[derive(Default)]
    struct FakeMailer {
        sent: RefCell<Vec<OutgoingMail>>,
    }

    impl MailTransport for FakeMailer {
        fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
            self.sent.borrow_mut().push(mail.clone());
            Ok(())
        }
    }

    fn request(sink: ReportSink, sources: Vec<Source>) -> CommitsRequest {
        CommitsRequest {
            sources,
            window: DateWindow::new(7, Utc.with_ymd_and_hms(2019, 6, 15, 12, 0, 0).single().unwrap()),
            identities: Identities {
                gerrit_users: vec!["alice@example.com".into()],
                git_roster: [("42", "Bob Builder")].into_iter().collect(),
            },
            git_repos: vec!["couchbase/backup".parse().unwrap()],
            git_per_page: 100,
            sink,
            mail: None,
        }
    }

    fn temp_sink() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("email.txt")).unwrap();
        (dir, path)
    }

    #[test]
    fn writes_and_mails_the_report() {
        let (_dir, path) = temp_sink();
        let mut req = request(ReportSink::File(path.clone()), vec![Source::Gerrit, Source::Git]);
        req.mail = Some(OutgoingMail {
            from: "build-team@example.com".into(),
            to: "lead@example.com".into(),
            subject: "Gerrit/Git commit - 7 day(s) report".into(),
            body: String::new(),
        });
        let mailer = FakeMailer::default();
        let clients = CommitClients {
            gerrit: Some(&FakeGerrit),
            git: Some(&FakeHost),
            mailer: Some(&mailer),
        };

        let mut events = Vec::new();
        let outcome = run_commits(req, clients, |e| events.push(e)).unwrap();

        let expected = "\
=== Alice Liddell (Gerrit) ===
Total Commit(s): 1
Repo(s): backup
Commit Messages:
I100 -- Fix restore

=== Bob Builder (Git) ===
Total Commit(s): 1
Repo(s): couchbase/backup
Commit Messages:
abc -- Tune

";
        assert_eq!(outcome.report, expected);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
        assert_eq!(outcome.mailed_to.as_deref(), Some("lead@example.com"));
        assert_eq!(mailer.sent.borrow()[0].body, expected);
        assert!(events.contains(&PipelineEvent::Started(Stage::Fetch(Source::Git))));
    }

    #[test]
    fn requested_order_is_report_order() {
        let (_dir, path) = temp_sink();
        let clients = CommitClients {
            gerrit: Some(&FakeGerrit),
            git: Some(&FakeHost),
            mailer: None,
        };
        let outcome = run_commits(request(ReportSink::File(path), vec![Source::Git, Source::Gerrit]), clients, |_| {})
            .unwrap();
        assert_eq!(outcome.sections[0].source, Source::Git);
        assert!(outcome.report.starts_with("=== Bob Builder (Git) ==="));
        assert_eq!(outcome.mailed_to, None);
    }

    #[test]
    fn missing_client_fails_before_fetching() {
        let (_dir, path) = temp_sink();
        let clients = CommitClients {
            gerrit: None,
            git: Some(&FakeHost),
            mailer: None,
        };
        let err = run_commits(request(ReportSink::File(path.clone()), vec![Source::Git, Source::Gerrit]), clients, |_| {})
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingSource(Source::Gerrit)));
        assert!(!path.exists());
    }

    #[test]
    fn recipient_without_relay_is_config_error() {
        let (_dir, path) = temp_sink();
        let mut req = request(ReportSink::File(path), vec![Source::Git]);
        req.mail = Some(OutgoingMail {
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            subject: "s".into(),
            body: String::new(),
        });
        let clients = CommitClients {
            git: Some(&FakeHost),
            ..CommitClients::default()
        };
        let err = run_commits(req, clients, |_| {}).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn identities_from_inline_config() {
        let source = RosterSource::Inline {
            gerrit_users: vec!["alice@example.com".into()],
            git_users: vec![GitUser {
                id: "42".into(),
                name: "Bob".into(),
            }],
        };
        let ids = Identities::from_config(&source, None).unwrap();
        assert_eq!(ids.gerrit_users, vec!["alice@example.com"]);
        assert_eq!(ids.git_roster.display_name("42"), Some("Bob"));
    }

    #[test]
    fn projects_file_identities_need_the_file() {
        let err = Identities::from_config(&RosterSource::ProjectsFile, None).unwrap_err();
        assert!(err.to_string().contains("tally.identities"));

        let projects = ProjectsConfig {
            gerrit_users: vec!["x@example.com".into()],
            ..ProjectsConfig::default()
        };
        let ids = Identities::from_config(&RosterSource::ProjectsFile, Some(&projects)).unwrap();
        assert_eq!(ids.gerrit_users, vec!["x@example.com"]);
    }
}
