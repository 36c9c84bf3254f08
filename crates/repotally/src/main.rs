//! repotally CLI
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use repotally::{Cli, Commands, commands};
use repotally_core::config::{Config, ConfigLoader};
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(dir) = &cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = utf8(cwd, "current directory")?;
    let config = load_config(&cli, &cwd)?;

    let _guard = observability::init_observability(
        &observability::ObservabilityConfig::from_env_with_overrides(
            config.log_dir.as_ref().map(|dir| dir.as_std_path().to_path_buf()),
        ),
        observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str()),
    )
    .context("failed to initialize logging")?;
    debug!(
        command = command_name(&cli.command),
        verbose = cli.verbose,
        quiet = cli.quiet,
        color = ?cli.color,
        %cwd,
        "CLI initialized"
    );

    let result = match cli.command {
        Commands::Commits(args) => commands::commits::cmd_commits(args, &config, cli.quiet),
        Commands::PrivateRepos(args) => {
            commands::private_repos::cmd_private_repos(args, &config, &cwd, cli.quiet)
        }
    };
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "fatal error");
    }
    result
}

fn load_config(cli: &Cli, cwd: &Utf8Path) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new().with_project_search(cwd);
    if let Some(path) = &cli.config {
        loader = loader.with_file(utf8(path.clone(), "config path")?);
    }
    loader.load().context("failed to load configuration")
}

fn utf8(path: PathBuf, what: &str) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path)
        .map_err(|e| anyhow!("{what} is not valid UTF-8: {}", e.into_path_buf().display()))
}

const fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Commits(_) => "commits",
        Commands::PrivateRepos(_) => "private-repos",
    }
}
