//! Error types for repotally-core

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur when loading configuration.
///
/// Covers both the app config (TOML/YAML/JSON through figment) and the
/// INI files the team maintains by hand.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize the app configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// A config file could not be read.
    #[error("unable to read config file {path}: {source}")]
    Read {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An INI file could not be parsed.
    #[error("invalid or unparseable config file {path}: {message}")]
    Parse {
        /// File that failed.
        path: Utf8PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// A required section is absent.
    #[error("config file {path} has no [{section}] section")]
    MissingSection {
        /// File that was inspected.
        path: Utf8PathBuf,
        /// The missing section name.
        section: String,
    },

    /// One or more required keys are absent from a section.
    #[error(
        "config file {path} is missing option(s) {missing:?} in [{section}]; required: {required}"
    )]
    MissingKeys {
        /// File that was inspected.
        path: Utf8PathBuf,
        /// Section that was inspected.
        section: String,
        /// Keys that were not found.
        missing: Vec<String>,
        /// Human-readable list of everything the section needs.
        required: String,
    },

    /// A value was present but unusable.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
