//! Contributor roster: identity to display name, in report order.

use indexmap::IndexMap;

/// Ordered mapping from stable identity to display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: IndexMap<String, String>,
}

impl Roster {
    /// An empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Re-adding an identity keeps its original position and
    /// replaces the display name.
    pub fn insert(&mut self, identity: impl Into<String>, display_name: impl Into<String>) {
        self.members.insert(identity.into(), display_name.into());
    }

    /// Whether the identity is on the roster.
    pub fn contains(&self, identity: &str) -> bool {
        self.members.contains_key(identity)
    }

    /// The roster's own copy of an identity, if present.
    pub fn identity(&self, identity: &str) -> Option<&str> {
        self.members
            .get_key_value(identity)
            .map(|(key, _)| key.as_str())
    }

    /// Display name for an identity.
    pub fn display_name(&self, identity: &str) -> Option<&str> {
        self.members.get(identity).map(String::as_str)
    }

    /// Resolve a free-text author name to an identity.
    ///
    /// An exact, case-insensitive display-name match wins. Otherwise the
    /// name must be contained in exactly one display name.
    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        if let Some((identity, _)) = self
            .members
            .iter()
            .find(|(_, display)| display.to_lowercase() == needle)
        {
            return Some(identity);
        }

        let mut partial = self
            .members
            .iter()
            .filter(|(_, display)| display.to_lowercase().contains(&needle));
        match (partial.next(), partial.next()) {
            (Some((identity, _)), None) => Some(identity),
            _ => None,
        }
    }

    /// Members in roster order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members
            .iter()
            .map(|(identity, name)| (identity.as_str(), name.as_str()))
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Roster {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut roster = Self::new();
        for (identity, name) in iter {
            roster.insert(identity, name);
        }
        roster
    }
}
