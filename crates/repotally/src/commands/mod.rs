//! Command implementations

pub mod commits;

pub mod private_repos;
