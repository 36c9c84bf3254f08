//! Private-repos command: categorized private repositories of a release.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::{OwoColorize, Stream};
use tracing::{debug, instrument};

use repotally_core::config::Config;
use repotally_core::drive::{DriveApi, DriveClient, TOKEN_ENV, resolve_token};
use repotally_core::http::HttpClient;
use repotally_core::ini::ProjectsConfig;
use repotally_core::private_repos::{
    PrivateReposOutcome, PrivateReposRequest, resolve_against, run_private_repos,
};

use crate::progress::Progress;

/// Arguments for the `private-repos` subcommand.
#[derive(Args, Debug)]
pub struct PrivateReposArgs {
    /// Release manifest XML to read
    #[arg(short, long, value_name = "FILE")]
    pub input: Utf8PathBuf,

    /// Release name; the report is written to `<RELEASE>.txt`
    #[arg(short, long, value_name = "RELEASE")]
    pub release: String,

    /// Projects file holding the category sections
    #[arg(long, value_name = "FILE", default_value = "projects.ini")]
    pub conf: Utf8PathBuf,

    /// Drive folder to publish into (overrides drive.folder_id)
    #[arg(long, value_name = "ID")]
    pub folder_id: Option<String>,

    /// File holding a Drive OAuth access token
    #[arg(long, value_name = "FILE")]
    pub drive_token_file: Option<Utf8PathBuf>,

    /// Write the report locally without publishing it
    #[arg(long)]
    pub no_upload: bool,
}

/// Build the private repository report.
#[instrument(name = "cmd_private_repos", skip_all, fields(release = %args.release))]
pub fn cmd_private_repos(
    args: PrivateReposArgs,
    config: &Config,
    cwd: &Utf8Path,
    quiet: bool,
) -> anyhow::Result<()> {
    let conf = resolve_against(cwd, &args.conf);
    let projects = ProjectsConfig::load(&conf)
        .with_context(|| format!("failed to load projects file {conf}"))?;
    debug!(categories = projects.categories.len(), "categories loaded");

    let drive = if args.no_upload {
        None
    } else {
        let token = resolve_token(args.drive_token_file.as_deref(), std::env::var(TOKEN_ENV).ok())
            .context("Drive upload needs an access token (or pass --no-upload)")?;
        Some(DriveClient::new(
            HttpClient::new(config.timeout()),
            &config.drive,
            token,
        ))
    };

    let request = PrivateReposRequest {
        manifest: resolve_against(cwd, &args.input),
        release: args.release,
        categories: projects.categories,
        output_dir: cwd.to_path_buf(),
        folder_id: args.folder_id.or_else(|| config.drive.folder_id.clone()),
    };

    let mut progress = Progress::new(quiet);
    let outcome = run_private_repos(
        &request,
        drive.as_ref().map(|d| d as &dyn DriveApi),
        |event| progress.handle(event),
    )
    .context("private repo report failed")?;
    progress.finish();

    if !quiet {
        print_summary(&outcome);
    }
    Ok(())
}

fn print_summary(outcome: &PrivateReposOutcome) {
    for (category, urls) in &outcome.grouped {
        eprintln!(
            "  {} {}: {} repo(s)",
            "•".if_supports_color(Stream::Stderr, |t| t.cyan()),
            category.if_supports_color(Stream::Stderr, |t| t.bold()),
            urls.len(),
        );
    }
    eprintln!(
        "{} Report written to {}",
        "✓".if_supports_color(Stream::Stderr, |t| t.green()),
        outcome.report_path.if_supports_color(Stream::Stderr, |t| t.cyan()),
    );
    if let Some(file) = &outcome.uploaded {
        eprintln!(
            "{} Uploaded {} ({})",
            "✓".if_supports_color(Stream::Stderr, |t| t.green()),
            file.name.if_supports_color(Stream::Stderr, |t| t.cyan()),
            file.id,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(no_upload: bool) -> PrivateReposArgs {
        PrivateReposArgs {
            input: "manifest.xml".into(),
            release: "mad-hatter".into(),
            conf: "projects.ini".into(),
            folder_id: None,
            drive_token_file: None,
            no_upload,
        }
    }

    #[test]
    fn missing_projects_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let err = cmd_private_repos(args(true), &Config::default(), &cwd, true).unwrap_err();
        assert!(format!("{err:#}").contains("projects.ini"));
    }

    #[test]
    fn no_upload_writes_report_into_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(cwd.join("projects.ini"), "[Backup]\nbackup\n").unwrap();
        std::fs::write(
            cwd.join("manifest.xml"),
            r#"<manifest>
  <remote name="priv" fetch="ssh://git@github.com/couchbase/"/>
  <project name="backup" remote="priv"/>
</manifest>"#,
        )
        .unwrap();

        cmd_private_repos(args(true), &Config::default(), &cwd, true).unwrap();
        let report = std::fs::read_to_string(cwd.join("mad-hatter.txt")).unwrap();
        assert_eq!(report, "=== Backup ===\nhttps://github.com/couchbase/backup\n\n");
    }
}
