//! Cross-reference private repositories against project categories.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::ini::CategoryMap;
use crate::manifest::PrivateRepo;

/// Category name to the sorted URLs of its private repositories.
pub type CategorizedRepos = IndexMap<String, BTreeSet<String>>;

/// Errors from categorizing repositories.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CategoryError {
    /// Repositories that no category claims.
    #[error(
        "private repos missing from the projects file, add them to a category: {}",
        .0.join(", ")
    )]
    Unresolved(Vec<String>),

    /// Repositories claimed by more than one category.
    #[error("private repos listed under more than one category: {}", describe(.0))]
    Ambiguous(BTreeMap<String, Vec<String>>),
}

fn describe(ambiguous: &BTreeMap<String, Vec<String>>) -> String {
    ambiguous
        .iter()
        .map(|(repo, categories)| format!("{repo} ({})", categories.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Group private repositories by category.
///
/// Every repo must belong to exactly one category. All offenders are
/// collected before failing, unresolved ones first.
#[instrument(skip_all, fields(repos = repos.len(), categories = categories.len()))]
pub fn categorize(
    repos: &[PrivateRepo],
    categories: &CategoryMap,
) -> Result<CategorizedRepos, CategoryError> {
    let mut unresolved = BTreeSet::new();
    let mut ambiguous = BTreeMap::new();
    let mut owner: BTreeMap<&str, &str> = BTreeMap::new();

    for repo in repos {
        let claimed: Vec<&str> = categories
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == &repo.name))
            .map(|(category, _)| category.as_str())
            .collect();
        match claimed.as_slice() {
            [] => {
                unresolved.insert(repo.name.clone());
            }
            [category] => {
                owner.insert(repo.name.as_str(), *category);
            }
            many => {
                ambiguous.insert(
                    repo.name.clone(),
                    many.iter().map(|c| (*c).to_string()).collect(),
                );
            }
        }
    }

    if !unresolved.is_empty() {
        return Err(CategoryError::Unresolved(unresolved.into_iter().collect()));
    }
    if !ambiguous.is_empty() {
        return Err(CategoryError::Ambiguous(ambiguous));
    }

    let mut grouped = CategorizedRepos::new();
    for category in categories.keys() {
        let urls: BTreeSet<String> = repos
            .iter()
            .filter(|repo| owner.get(repo.name.as_str()) == Some(&category.as_str()))
            .map(|repo| repo.url.clone())
            .collect();
        if !urls.is_empty() {
            grouped.insert(category.clone(), urls);
        }
    }
    debug!(categories = grouped.len(), "repos categorized");
    Ok(grouped)
}
