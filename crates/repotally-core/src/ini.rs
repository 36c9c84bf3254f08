//! INI files maintained by the build team.
//!
//! Two shapes are read here:
//!
//! - the projects file, whose `[gerrit-users]`, `[git-users]` and
//!   `[smtp_server]` sections drive the commit tally and whose remaining
//!   sections are private-repo categories;
//! - credentials files, one per REST service, with a `[main]` section.
//!
//! Keys may appear without a value (`allow_no_value` in the team's
//! original tooling). Section and key order is preserved.

use std::fmt;

use camino::Utf8Path;
use configparser::ini::Ini;
use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::roster::Roster;

const GERRIT_USERS: &str = "gerrit-users";
const GIT_USERS: &str = "git-users";
const SMTP_SERVER: &str = "smtp_server";
const MAIN: &str = "main";

/// Keys of one section, in file order. Bare keys map to `None`.
pub type Section = IndexMap<String, Option<String>>;

/// A parsed INI file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: IndexMap<String, Section>,
}

impl IniDocument {
    /// Read and parse a file.
    pub fn load(path: &Utf8Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, text)
    }

    /// Parse INI text; `path` is only used in diagnostics.
    pub fn parse(path: &Utf8Path, text: String) -> ConfigResult<Self> {
        // values are taken whole: passwords and URLs may contain '#' or ';'
        let mut defaults = Ini::new_cs().defaults();
        defaults.enable_inline_comments = false;
        let mut ini = Ini::new_from_defaults(defaults);
        let parsed = ini.read(text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        let sections: IndexMap<String, Section> = parsed
            .into_iter()
            // configparser files keys outside any section under "default"
            .filter(|(name, keys)| !(name == "default" && keys.is_empty()))
            .map(|(name, keys)| (name, keys.into_iter().collect()))
            .collect();

        if sections.is_empty() {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: "no sections found".to_string(),
            });
        }
        Ok(Self { sections })
    }

    /// Section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// All sections in file order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(name, keys)| (name.as_str(), keys))
    }
}

/// Ordered category name to member repo short names.
pub type CategoryMap = IndexMap<String, Vec<String>>;

/// Contents of the projects file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectsConfig {
    /// Gerrit account emails from `[gerrit-users]`.
    pub gerrit_users: Vec<String>,
    /// Git host login id to display name from `[git-users]`.
    pub git_users: Roster,
    /// First key of `[smtp_server]`, if any.
    pub smtp_server: Option<String>,
    /// Every other section, as private-repo categories.
    pub categories: CategoryMap,
}

impl ProjectsConfig {
    /// Load the projects file.
    #[instrument(skip_all, fields(path = %path))]
    pub fn load(path: &Utf8Path) -> ConfigResult<Self> {
        let projects = Self::from_document(&IniDocument::load(path)?);
        debug!(
            gerrit_users = projects.gerrit_users.len(),
            git_users = projects.git_users.len(),
            categories = projects.categories.len(),
            "projects file loaded"
        );
        Ok(projects)
    }

    /// Interpret an already-parsed document.
    pub fn from_document(doc: &IniDocument) -> Self {
        let mut projects = Self::default();
        for (name, keys) in doc.sections() {
            match name {
                GERRIT_USERS => projects.gerrit_users = keys.keys().cloned().collect(),
                GIT_USERS => {
                    projects.git_users = keys
                        .iter()
                        .map(|(id, name)| (id.clone(), name.clone().unwrap_or_else(|| id.clone())))
                        .collect();
                }
                SMTP_SERVER => {
                    // `host:port` splits on the ':' delimiter; stitch it back
                    projects.smtp_server = keys.iter().next().map(|(host, port)| match port {
                        Some(port) if !port.is_empty() => format!("{host}:{port}"),
                        _ => host.clone(),
                    });
                }
                _ => {
                    projects
                        .categories
                        .insert(name.to_string(), keys.keys().cloned().collect());
                }
            }
        }
        projects
    }
}

/// `[main]` section of a REST service credentials file.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Service base URL.
    pub base_url: String,
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password or token.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Load credentials whose URL lives under `url_key` (e.g. `gerrit_url`).
    /// `base_url` is accepted as an alternative spelling.
    #[instrument(skip_all, fields(path = %path))]
    pub fn load(path: &Utf8Path, url_key: &str) -> ConfigResult<Self> {
        Self::from_document(path, &IniDocument::load(path)?, url_key)
    }

    /// Interpret an already-parsed document.
    pub fn from_document(path: &Utf8Path, doc: &IniDocument, url_key: &str) -> ConfigResult<Self> {
        let main = doc.section(MAIN).ok_or_else(|| ConfigError::MissingSection {
            path: path.to_path_buf(),
            section: MAIN.to_string(),
        })?;

        let value = |key: &str| {
            main.get(key)
                .and_then(Option::as_deref)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let base_url = value(url_key).or_else(|| value("base_url"));
        let username = value("username");
        let password = value("password");

        let mut missing = Vec::new();
        if base_url.is_none() {
            missing.push(url_key.to_string());
        }
        if username.is_none() {
            missing.push("username".to_string());
        }
        if password.is_none() {
            missing.push("password".to_string());
        }

        match (base_url, username, password) {
            (Some(base_url), Some(username), Some(password)) => Ok(Self {
                base_url,
                username,
                password,
            }),
            _ => Err(ConfigError::MissingKeys {
                path: path.to_path_buf(),
                section: MAIN.to_string(),
                missing,
                required: format!("{url_key}, username, password"),
            }),
        }
    }
}
