//! Core library for repotally.
//!
//! This crate provides the types and workflows behind the `repotally` CLI:
//! a date-windowed commit tally over Gerrit and a GitHub-style Git host, and
//! a private-repository report built from a release manifest.
//!
//! # Modules
//!
//! - [`config`] - App configuration loading and management
//! - [`ini`] - Projects and credentials INI files
//! - [`record`], [`window`], [`roster`], [`tally`] - The aggregation model
//! - [`http`], [`gerrit`], [`github`] - REST collaborators
//! - [`manifest`], [`category`] - Private-repo discovery and grouping
//! - [`report`], [`mail`], [`drive`] - Rendering and delivery
//! - [`commits`], [`private_repos`] - The two workflows
//! - [`error`], [`pipeline`] - Error types and workflow plumbing
//!
//! # Quick Start
//!
//! ```no_run
//! use repotally_core::{ConfigLoader, DateWindow, Roster, tally};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! let roster: Roster = [("42", "Bob Builder")].into_iter().collect();
//! let result = tally(&[], &DateWindow::ending_now(7), &roster);
//! println!("{} of {:?} attributed", result.attributed_total(), config.tally.sources);
//! ```
#![deny(unsafe_code)]

pub mod category;

pub mod commits;

pub mod config;

pub mod drive;

pub mod error;

pub mod gerrit;

pub mod github;

pub mod http;

pub mod ini;

pub mod mail;

pub mod manifest;

pub mod pipeline;

pub mod private_repos;

pub mod record;

pub mod report;

pub mod roster;

pub mod tally;

pub mod window;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use pipeline::{PipelineError, PipelineEvent, PipelineResult, Stage};

pub use record::{ActivityRecord, AuthorRef, RecordStream, Source};

pub use roster::Roster;

pub use tally::{Tally, tally};

pub use window::{DateWindow, TimestampFormat};
