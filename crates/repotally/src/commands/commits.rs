//! Commits command: the per-contributor commit tally.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use clap::Args;
use owo_colors::{OwoColorize, Stream};
use tracing::{debug, instrument, warn};

use repotally_core::commits::{CommitClients, CommitsOutcome, CommitsRequest, Identities, run_commits};
use repotally_core::config::{Config, RepoRef, RosterSource};
use repotally_core::gerrit::{GerritApi, GerritClient};
use repotally_core::github::{GitHostApi, GitHostClient};
use repotally_core::http::HttpClient;
use repotally_core::ini::{Credentials, ProjectsConfig};
use repotally_core::mail::{MailTransport, OutgoingMail, SmtpMailer};
use repotally_core::report::ReportSink;
use repotally_core::{DateWindow, Source};

use crate::progress::Progress;

/// Arguments for the `commits` subcommand.
#[derive(Args, Debug)]
pub struct CommitsArgs {
    /// Projects file listing Gerrit and Git users and the SMTP server
    #[arg(long, value_name = "FILE", default_value = "projects.ini")]
    pub conf: Utf8PathBuf,

    /// Gerrit credentials file ([main] gerrit_url, username, password)
    #[arg(long, value_name = "FILE", default_value = "patch_via_gerrit.ini")]
    pub gerrit_config: Utf8PathBuf,

    /// Git host credentials file ([main] git_url, username, password)
    #[arg(long, value_name = "FILE", default_value = "git_committer.ini")]
    pub git_config: Utf8PathBuf,

    /// Number of trailing days to count
    #[arg(short, long, value_name = "DAYS", default_value_t = 7)]
    pub date_range: u32,

    /// Mail the report to this address
    #[arg(short, long, value_name = "EMAIL")]
    pub recipient: Option<String>,

    /// Report destination; `-` for stdout
    #[arg(short, long, value_name = "FILE", default_value = "email.txt")]
    pub output: ReportSink,

    /// Source to tally (repeatable; defaults to tally.sources from config)
    #[arg(long = "source", value_enum, value_name = "SOURCE")]
    pub sources: Vec<Source>,

    /// Extra Git repository to scan (repeatable)
    #[arg(long = "repo", value_name = "OWNER/NAME", value_parser = parse_repo)]
    pub repos: Vec<RepoRef>,

    /// Anchor the window at this instant instead of now
    #[arg(long, hide = true, value_name = "RFC3339")]
    pub now: Option<DateTime<Utc>>,
}

fn parse_repo(value: &str) -> Result<RepoRef, String> {
    value.parse().map_err(|e: repotally_core::ConfigError| e.to_string())
}

/// Run the commit tally.
#[instrument(name = "cmd_commits", skip_all, fields(days = args.date_range))]
pub fn cmd_commits(args: CommitsArgs, config: &Config, quiet: bool) -> anyhow::Result<()> {
    let sources = requested_sources(&args.sources, &config.tally.sources);
    debug!(?sources, "sources resolved");

    let projects = load_projects(&args.conf, &config.tally.identities)?;
    let identities = Identities::from_config(&config.tally.identities, projects.as_ref())
        .context("failed to resolve contributor identities")?;

    let (gerrit, git) = connect(&sources, &args, &HttpClient::new(config.timeout()))?;

    let smtp_server = config
        .mail
        .smtp_server
        .clone()
        .or_else(|| projects.as_ref().and_then(|p| p.smtp_server.clone()));
    let mailer = match (&args.recipient, smtp_server) {
        (Some(_), Some(server)) => Some(
            SmtpMailer::new(&server, config.timeout()).context("invalid SMTP server setting")?,
        ),
        _ => None,
    };
    let mail = args.recipient.clone().map(|to| OutgoingMail {
        from: config.mail.from.clone(),
        to,
        subject: config.mail.subject_for(args.date_range),
        body: String::new(),
    });

    let window = DateWindow::new(args.date_range, args.now.unwrap_or_else(Utc::now));
    debug!(start = %window.start(), now = %window.now, "date window");

    let request = CommitsRequest {
        sources,
        window,
        identities,
        git_repos: merge_repos(&config.tally.git_repos, &args.repos),
        git_per_page: config.tally.git_per_page,
        sink: args.output.clone(),
        mail,
    };
    let clients = CommitClients {
        gerrit: gerrit.as_ref().map(|c| c as &dyn GerritApi),
        git: git.as_ref().map(|c| c as &dyn GitHostApi),
        mailer: mailer.as_ref().map(|m| m as &dyn MailTransport),
    };

    let mut progress = Progress::new(quiet);
    let outcome = run_commits(request, clients, |event| progress.handle(event))
        .context("commit tally failed")?;
    progress.finish();

    if !quiet {
        print_summary(&outcome, &args.output);
    }
    Ok(())
}

/// Sources from the command line win; duplicates keep their first position.
fn requested_sources(cli: &[Source], configured: &[Source]) -> Vec<Source> {
    let chosen = if cli.is_empty() { configured } else { cli };
    let mut sources = Vec::with_capacity(chosen.len());
    for source in chosen {
        if !sources.contains(source) {
            sources.push(*source);
        }
    }
    sources
}

/// Build a client for each requested source, reading credentials in the
/// order the sources were given so the first missing file is reported.
fn connect(
    sources: &[Source],
    args: &CommitsArgs,
    http: &HttpClient,
) -> anyhow::Result<(Option<GerritClient>, Option<GitHostClient>)> {
    let mut gerrit = None;
    let mut git = None;
    for source in sources {
        match source {
            Source::Gerrit => {
                let creds = Credentials::load(&args.gerrit_config, "gerrit_url")
                    .context("failed to load Gerrit credentials")?;
                gerrit = Some(GerritClient::new(http.clone(), &creds));
            }
            Source::Git => {
                let creds = Credentials::load(&args.git_config, "git_url")
                    .context("failed to load Git host credentials")?;
                git = Some(GitHostClient::new(http.clone(), &creds));
            }
        }
    }
    Ok((gerrit, git))
}

fn merge_repos(configured: &[RepoRef], extra: &[RepoRef]) -> Vec<RepoRef> {
    let mut repos: Vec<RepoRef> = Vec::with_capacity(configured.len() + extra.len());
    for repo in configured.iter().chain(extra) {
        if !repos.contains(repo) {
            repos.push(repo.clone());
        }
    }
    repos
}

/// The projects file is required when identities come from it; otherwise it
/// is read only if present, for its SMTP server.
fn load_projects(path: &Utf8Path, identities: &RosterSource) -> anyhow::Result<Option<ProjectsConfig>> {
    let required = matches!(identities, RosterSource::ProjectsFile);
    if !required && !path.exists() {
        debug!(%path, "projects file not present, continuing with inline identities");
        return Ok(None);
    }
    let projects = ProjectsConfig::load(path)
        .with_context(|| format!("failed to load projects file {path}"))?;
    Ok(Some(projects))
}

fn print_summary(outcome: &CommitsOutcome, sink: &ReportSink) {
    for section in &outcome.sections {
        let tally = &section.tally;
        eprintln!(
            "  {} {}: {} commit(s) from {} contributor(s)",
            "•".if_supports_color(Stream::Stderr, |t| t.cyan()),
            section.source.if_supports_color(Stream::Stderr, |t| t.bold()),
            tally.attributed_total(),
            tally.entries.iter().filter(|e| e.total > 0).count(),
        );
        if !tally.unattributed.is_empty() {
            warn!(source = %section.source, count = tally.unattributed.len(), "unattributed records in report");
        }
        for label in &tally.out_of_order {
            eprintln!(
                "    {} {label} was not sorted newest first",
                "!".if_supports_color(Stream::Stderr, |t| t.yellow()),
            );
        }
    }
    if let Some(path) = sink.path() {
        eprintln!(
            "{} Report written to {}",
            "✓".if_supports_color(Stream::Stderr, |t| t.green()),
            path.if_supports_color(Stream::Stderr, |t| t.cyan()),
        );
    }
    if let Some(to) = &outcome.mailed_to {
        eprintln!(
            "{} Report mailed to {}",
            "✓".if_supports_color(Stream::Stderr, |t| t.green()),
            to.if_supports_color(Stream::Stderr, |t| t.cyan()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_sources_override_config_and_dedupe() {
        let configured = [Source::Gerrit, Source::Git];
        assert_eq!(requested_sources(&[], &configured), vec![Source::Gerrit, Source::Git]);
        assert_eq!(
            requested_sources(&[Source::Git, Source::Git], &configured),
            vec![Source::Git]
        );
    }

    #[test]
    fn repos_merge_without_duplicates() {
        let a: RepoRef = "couchbase/backup".parse().unwrap();
        let b: RepoRef = "couchbaselabs/mobile-testkit".parse().unwrap();
        let merged = merge_repos(&[a.clone()], &[b.clone(), a.clone()]);
        assert_eq!(merged, vec![a, b]);
    }

    #[test]
    fn inline_identities_do_not_need_projects_file() {
        let inline = RosterSource::Inline {
            gerrit_users: vec![],
            git_users: vec![],
        };
        let loaded = load_projects(Utf8Path::new("/nope/projects.ini"), &inline).unwrap();
        assert!(loaded.is_none());
        assert!(load_projects(Utf8Path::new("/nope/projects.ini"), &RosterSource::ProjectsFile).is_err());
    }

    fn missing_credentials() -> CommitsArgs {
        #[derive(clap::Parser)]
        struct Harness {
            #[command(flatten)]
            commits: CommitsArgs,
        }
        let base = [
            "commits",
            "--gerrit-config",
            "/nope/patch_via_gerrit.ini",
            "--git-config",
            "/nope/git_committer.ini",
        ];
        <Harness as clap::Parser>::parse_from(base).commits
    }

    #[test]
    fn credentials_load_in_source_order() {
        let http = HttpClient::new(std::time::Duration::from_secs(1));
        let git_first = connect(&[Source::Git, Source::Gerrit], &missing_credentials(), &http).unwrap_err();
        assert_eq!(git_first.to_string(), "failed to load Git host credentials");

        let gerrit_first = connect(&[Source::Gerrit, Source::Git], &missing_credentials(), &http).unwrap_err();
        assert_eq!(gerrit_first.to_string(), "failed to load Gerrit credentials");
    }

    #[test]
    fn unrequested_sources_need_no_credentials() {
        let http = HttpClient::new(std::time::Duration::from_secs(1));
        let (gerrit, git) = connect(&[], &missing_credentials(), &http).unwrap();
        assert!(gerrit.is_none());
        assert!(git.is_none());
    }

    #[test]
    fn repo_flag_rejects_garbage() {
        assert!(parse_repo("couchbase/backup").is_ok());
        assert!(parse_repo("no-slash").is_err());
    }
}
