//! Plugin data types shared by the scanner, the resolver and the engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata declared by a plugin manifest.
///
/// Only `name` and `version` drive resolution; everything else is carried for
/// the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name, the grouping key for version resolution.
    pub name: String,
    /// Raw version string, parsed lazily by the resolver.
    #[serde(default)]
    pub version: String,
    /// Library entry point, relative to the plugin folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Engine version requirement (semver range).
    #[serde(
        default,
        rename = "engine-version",
        skip_serializing_if = "Option::is_none"
    )]
    pub engine_requirement: Option<String>,
    /// Remaining manifest keys.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            main: None,
            engine_requirement: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = Some(main.into());
        self
    }

    pub fn with_engine_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.engine_requirement = Some(requirement.into());
        self
    }
}

/// A discovered plugin that passed the compatibility check.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    /// Absolute path of the plugin folder.
    pub path: PathBuf,
    pub metadata: PluginMetadata,
}

impl PluginDescriptor {
    pub fn new(path: impl Into<PathBuf>, metadata: PluginMetadata) -> Self {
        Self {
            path: path.into(),
            metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Verdict of the engine's compatibility check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compatibility {
    pub compatible: bool,
    /// Advisory message, logged whether or not the plugin is compatible.
    pub message: Option<String>,
}

impl Compatibility {
    pub fn compatible() -> Self {
        Self {
            compatible: true,
            message: None,
        }
    }

    pub fn incompatible(message: impl Into<String>) -> Self {
        Self {
            compatible: false,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A plugin the engine accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPlugin {
    pub name: String,
    /// Version as declared in the manifest.
    pub version: String,
    pub path: PathBuf,
}

impl LoadedPlugin {
    pub fn from_descriptor(descriptor: &PluginDescriptor) -> Self {
        Self {
            name: descriptor.metadata.name.clone(),
            version: descriptor.metadata.version.clone(),
            path: descriptor.path.clone(),
        }
    }
}

impl std::fmt::Display for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.version, self.path.display())
    }
}
