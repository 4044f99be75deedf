//! Version resolution: one loaded version per plugin name.
//!
//! Candidates are grouped by name and tried newest first. A broken newest
//! version degrades to the next older one instead of taking the plugin, or
//! any other plugin, down with it.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::PathBuf;

use semver::{BuildMetadata, Version};
use tracing::{debug, info, warn};

use super::sandbox::SandboxContext;
use super::types::{LoadedPlugin, PluginDescriptor};
use super::whitelist::PluginWhitelist;
use crate::engine::AutomationEngine;

/// Candidates sharing one plugin name, highest precedence first.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginGroup {
    pub name: String,
    pub candidates: Vec<PluginDescriptor>,
}

/// A load attempt that failed and was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveReport {
    pub loaded: Vec<LoadedPlugin>,
    pub failures: Vec<LoadFailure>,
}

impl ResolveReport {
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

/// Groups, orders and loads plugin candidates.
#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    whitelist: Option<PluginWhitelist>,
}

impl VersionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only plugins named in `whitelist` are considered.
    pub fn with_whitelist(mut self, whitelist: PluginWhitelist) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    pub fn whitelist(&self) -> Option<&PluginWhitelist> {
        self.whitelist.as_ref()
    }

    /// Filter by whitelist, group by name and sort each group newest first.
    ///
    /// Groups keep the order in which their names were first discovered.
    pub fn group(&self, descriptors: Vec<PluginDescriptor>) -> Vec<PluginGroup> {
        let mut groups: Vec<PluginGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for descriptor in descriptors {
            if let Some(whitelist) = &self.whitelist {
                if !whitelist.contains(descriptor.name()) {
                    debug!(
                        plugin = %descriptor.name(),
                        path = %descriptor.path.display(),
                        "Plugin not in whitelist, skipping"
                    );
                    continue;
                }
            }

            if parse_version(&descriptor.metadata.version).is_none() {
                warn!(
                    plugin = %descriptor.name(),
                    version = %descriptor.metadata.version,
                    path = %descriptor.path.display(),
                    "Invalid plugin version, treating as 0.0.0"
                );
            }

            let slot = *index.entry(descriptor.name().to_string()).or_insert_with(|| {
                groups.push(PluginGroup {
                    name: descriptor.name().to_string(),
                    candidates: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].candidates.push(descriptor);
        }

        for group in &mut groups {
            // Stable: equal versions keep discovery order
            group
                .candidates
                .sort_by_cached_key(|d| Reverse(precedence(&d.metadata.version)));
        }

        groups
    }

    /// Load one version per plugin name.
    ///
    /// Within a group candidates are tried strictly in order and the first
    /// success ends the group. A zero count in the report is for the caller
    /// to treat as fatal.
    pub fn resolve<E>(
        &self,
        descriptors: Vec<PluginDescriptor>,
        engine: &E,
        sandbox: &SandboxContext,
    ) -> ResolveReport
    where
        E: AutomationEngine + ?Sized,
    {
        let mut report = ResolveReport::default();

        for group in self.group(descriptors) {
            for candidate in &group.candidates {
                match engine.load_plugin(candidate, sandbox) {
                    Ok(loaded) => {
                        info!(plugin = %loaded, "Plugin loaded");
                        report.loaded.push(loaded);
                        break;
                    }
                    Err(e) => {
                        warn!(
                            plugin = %group.name,
                            version = %candidate.metadata.version,
                            path = %candidate.path.display(),
                            error = %e,
                            "Failed to load plugin, trying next version"
                        );
                        report.failures.push(LoadFailure {
                            name: group.name.clone(),
                            version: candidate.metadata.version.clone(),
                            path: candidate.path.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        report
    }
}

/// Parse a plugin version, tolerating surrounding whitespace and a leading
/// `v` or `=`.
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

/// Ordering key: the parsed version without build metadata, or `0.0.0`
/// when the version is not valid semver.
pub fn precedence(raw: &str) -> Version {
    let mut version = parse_version(raw).unwrap_or_else(|| Version::new(0, 0, 0));
    version.build = BuildMetadata::EMPTY;
    version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginMetadata;
    use crate::test_support::ScriptedEngine;

    fn candidate(name: &str, version: &str, dir: &str) -> PluginDescriptor {
        PluginDescriptor::new(
            format!("/plugins/{}", dir),
            PluginMetadata::new(name, version),
        )
    }

    fn versions(group: &PluginGroup) -> Vec<&str> {
        group
            .candidates
            .iter()
            .map(|d| d.metadata.version.as_str())
            .collect()
    }

    #[test]
    fn test_parse_version_leniency() {
        assert_eq!(parse_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version(" v1.2.3 "), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("=1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("1.2"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_precedence_ignores_build_metadata() {
        assert_eq!(precedence("1.0.0+build.5"), precedence("1.0.0+build.1"));
        assert_eq!(precedence("garbage"), Version::new(0, 0, 0));
        assert!(precedence("1.0.0-beta") < precedence("1.0.0"));
    }

    #[test]
    fn test_groups_sorted_descending() {
        let groups = VersionResolver::new().group(vec![
            candidate("demo", "1.0.0", "a"),
            candidate("demo", "2.1.0", "b"),
            candidate("other", "0.1.0", "c"),
            candidate("demo", "1.10.0", "d"),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "demo");
        assert_eq!(versions(&groups[0]), vec!["2.1.0", "1.10.0", "1.0.0"]);
        assert_eq!(groups[1].name, "other");
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let groups = VersionResolver::new().group(vec![
            candidate("demo", "1.0.0", "first"),
            candidate("demo", "1.0.0", "second"),
        ]);

        let paths: Vec<_> = groups[0].candidates.iter().map(|d| d.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/plugins/first"), PathBuf::from("/plugins/second")]
        );
    }

    #[test]
    fn test_invalid_version_sorts_last_but_is_kept() {
        let groups = VersionResolver::new().group(vec![
            candidate("demo", "not-a-version", "a"),
            candidate("demo", "0.0.1", "b"),
        ]);

        assert_eq!(versions(&groups[0]), vec!["0.0.1", "not-a-version"]);
    }

    #[test]
    fn test_first_success_wins() {
        let engine = ScriptedEngine::default()
            .failing_load("demo", "3.0.0")
            .failing_load("demo", "2.0.0");
        let sandbox = SandboxContext::default();

        let report = VersionResolver::new().resolve(
            vec![
                candidate("demo", "1.0.0", "a"),
                candidate("demo", "3.0.0", "b"),
                candidate("demo", "0.5.0", "c"),
                candidate("demo", "2.0.0", "d"),
            ],
            &engine,
            &sandbox,
        );

        assert_eq!(report.loaded_count(), 1);
        assert_eq!(report.loaded[0].version, "1.0.0");
        assert_eq!(report.failures.len(), 2);
        // 0.5.0 is never attempted
        assert_eq!(
            engine.attempts(),
            vec![
                ("demo".to_string(), "3.0.0".to_string()),
                ("demo".to_string(), "2.0.0".to_string()),
                ("demo".to_string(), "1.0.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_version_still_attempted() {
        let engine = ScriptedEngine::default().failing_load("demo", "1.0.0");
        let sandbox = SandboxContext::default();

        let report = VersionResolver::new().resolve(
            vec![candidate("demo", "1.0.0", "a"), candidate("demo", "latest", "b")],
            &engine,
            &sandbox,
        );

        assert_eq!(report.loaded_count(), 1);
        assert_eq!(report.loaded[0].version, "latest");
    }

    #[test]
    fn test_whitelist_excludes_before_any_attempt() {
        let engine = ScriptedEngine::default();
        let sandbox = SandboxContext::default();

        let report = VersionResolver::new()
            .with_whitelist(PluginWhitelist::parse("alpha"))
            .resolve(
                vec![candidate("alpha", "1.0.0", "a"), candidate("beta", "1.0.0", "b")],
                &engine,
                &sandbox,
            );

        assert_eq!(report.loaded_count(), 1);
        assert!(engine.attempts().iter().all(|(name, _)| name == "alpha"));
    }

    #[test]
    fn test_groups_fail_independently() {
        let engine = ScriptedEngine::default().failing_load("alpha", "1.0.0");
        let sandbox = SandboxContext::default();

        let report = VersionResolver::new().resolve(
            vec![candidate("alpha", "1.0.0", "a"), candidate("beta", "1.0.0", "b")],
            &engine,
            &sandbox,
        );

        assert_eq!(report.loaded_count(), 1);
        assert_eq!(report.loaded[0].name, "beta");
        assert_eq!(report.failures[0].name, "alpha");
    }

    #[test]
    fn test_all_failures_report_zero() {
        let engine = ScriptedEngine::default()
            .failing_load("alpha", "1.0.0")
            .failing_load("beta", "2.0.0");
        let sandbox = SandboxContext::default();

        let report = VersionResolver::new().resolve(
            vec![candidate("alpha", "1.0.0", "a"), candidate("beta", "2.0.0", "b")],
            &engine,
            &sandbox,
        );

        assert!(report.is_empty());
        assert_eq!(report.failures.len(), 2);
    }
}
