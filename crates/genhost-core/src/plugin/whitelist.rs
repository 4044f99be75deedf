//! Plugin name whitelist.

use std::collections::HashSet;

/// Names of the plugins allowed to load in whitelist mode.
///
/// Matching is exact and case-sensitive on trimmed names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginWhitelist {
    names: HashSet<String>,
}

impl PluginWhitelist {
    /// Parse a comma-separated list such as `"alpha, beta"`. Empty entries are dropped.
    pub fn parse(list: &str) -> Self {
        list.split(',').collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name.trim())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Sorted names, for logging.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<S: AsRef<str>> FromIterator<S> for PluginWhitelist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let names = iter
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { names }
    }
}
