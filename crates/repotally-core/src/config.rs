//! Configuration loading and discovery.
//!
//! The app config carries the knobs that do not belong in the team's INI
//! files: logging, network timeouts, which sources and repositories a tally
//! covers, mail defaults and drive endpoints.
//!
//! Files are TOML, YAML (`.yaml`, `.yml`) or JSON, picked by extension.
//! Precedence, highest first:
//!
//! - files passed with `-c`
//! - the nearest `.repotally.<ext>` or `repotally.<ext>` at or above the
//!   working directory, not crossing a `.git` boundary
//! - `~/.config/repotally/config.<ext>`
//! - built-in defaults
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use repotally_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::record::Source;

/// The configuration for repotally.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Upper bound, in seconds, for every external call (REST, SMTP, drive).
    pub timeout_secs: u64,
    /// Commit tally settings.
    pub tally: TallyConfig,
    /// Outgoing mail settings.
    pub mail: MailConfig,
    /// Drive upload settings.
    pub drive: DriveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_dir: None,
            timeout_secs: 30,
            tally: TallyConfig::default(),
            mail: MailConfig::default(),
            drive: DriveConfig::default(),
        }
    }
}

impl Config {
    /// The network timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Commit tally behavior.
///
/// Every variation the team used to keep as a separate script copy is an
/// option here.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TallyConfig {
    /// Where the contributor roster comes from.
    pub identities: RosterSource,
    /// Sources to tally, in report order.
    pub sources: Vec<Source>,
    /// Repositories on the Git host whose commit lists are scanned.
    pub git_repos: Vec<RepoRef>,
    /// Page size requested from the Git host commits endpoint.
    pub git_per_page: u32,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            identities: RosterSource::default(),
            sources: vec![Source::Gerrit, Source::Git],
            git_repos: Vec::new(),
            git_per_page: 100,
        }
    }
}

/// Where contributor identities are read from.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "from", rename_all = "kebab-case")]
pub enum RosterSource {
    /// `[gerrit-users]` and `[git-users]` sections of the projects INI file.
    #[default]
    ProjectsFile,
    /// Listed directly in the app config.
    Inline {
        /// Gerrit account emails.
        #[serde(default)]
        gerrit_users: Vec<String>,
        /// Git host accounts, in report order.
        #[serde(default)]
        git_users: Vec<GitUser>,
    },
}

/// A Git host account listed inline in the app config.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GitUser {
    /// Numeric login id as reported by the Git host.
    pub id: String,
    /// Display name used in reports and for name-based resolution.
    pub name: String,
}

/// An `owner/name` repository on the Git host.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// Organization or user owning the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ConfigError::InvalidValue {
                key: "repo".to_string(),
                message: format!("expected owner/name, got {s:?}"),
            }),
        }
    }
}

/// Outgoing mail settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct MailConfig {
    /// `From` address on report emails.
    pub from: String,
    /// SMTP relay (`host` or `host:port`). When unset, the projects INI
    /// `[smtp_server]` section is used.
    pub smtp_server: Option<String>,
    /// Subject template; `{days}` is replaced by the date range.
    pub subject: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "build-team@localhost".to_string(),
            smtp_server: None,
            subject: "Gerrit/Git commit - {days} day(s) report".to_string(),
        }
    }
}

impl MailConfig {
    /// Render the subject line for a given date range.
    pub fn subject_for(&self, days: u32) -> String {
        self.subject.replace("{days}", &days.to_string())
    }
}

/// Drive upload settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriveConfig {
    /// Default destination folder when `--folder-id` is not given.
    pub folder_id: Option<String>,
    /// Base URL of the Drive v3 metadata API.
    pub api_base: String,
    /// Base URL of the Drive v3 upload API.
    pub upload_base: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            folder_id: None,
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Config file extensions, most preferred first.
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Stem of project config files and name of the XDG directory.
const APP_NAME: &str = "repotally";

/// Layers the app config from defaults, user, project and explicit files.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    /// Directory entry that ends the upward project search.
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Loader with the user config enabled and `.git` as search boundary.
    pub fn new() -> Self {
        Self {
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            ..Self::default()
        }
    }

    /// Search for a project config upward from `path`.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Toggle `~/.config/repotally/config.<ext>`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Stop the project search at the directory holding `marker`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Search all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Layer an explicit file on top; later files win. Unlike discovered
    /// files, a missing explicit file is an error.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Files to merge over the defaults, lowest precedence first: user
    /// config, nearest project config, explicit files.
    pub fn sources(&self) -> ConfigResult<Vec<Utf8PathBuf>> {
        let mut files = Vec::new();
        if self.include_user_config {
            files.extend(user_config());
        }
        if let Some(root) = &self.project_search_root {
            files.extend(self.project_config(root));
        }
        for file in &self.explicit_files {
            if !file.is_file() {
                return Err(ConfigError::Read {
                    path: file.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
            files.push(file.clone());
        }
        Ok(files)
    }

    /// Merge every source over the defaults and deserialize.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        let sources = self.sources()?;
        tracing::debug!(?sources, "config sources");

        let config: Config = sources
            .iter()
            .fold(Figment::from(Serialized::defaults(Config::default())), |figment, path| {
                match path.extension() {
                    Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
                    Some("json") => figment.merge(Json::file_exact(path.as_str())),
                    _ => figment.merge(Toml::file_exact(path.as_str())),
                }
            })
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;

        tracing::info!(
            log_level = config.log_level.as_str(),
            timeout_secs = config.timeout_secs,
            sources = sources.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Nearest `.repotally.<ext>` or `repotally.<ext>` at or above `start`.
    /// A directory holding the boundary marker is searched, its parents are not.
    fn project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        for dir in start.ancestors() {
            let found = CONFIG_EXTENSIONS.iter().find_map(|ext| {
                [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")]
                    .into_iter()
                    .map(|name| dir.join(name))
                    .find(|path| path.is_file())
            });
            if found.is_some() {
                return found;
            }
            if let Some(marker) = &self.boundary_marker
                && dir.join(marker).exists()
            {
                return None;
            }
        }
        None
    }
}

/// `config.<ext>` in the platform config directory.
fn user_config() -> Option<Utf8PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dirs.config_dir().join(format!("config.{ext}")))
        .find(|path| path.is_file())
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}
