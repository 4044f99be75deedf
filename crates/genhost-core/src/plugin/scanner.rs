//! Plugin directory scanning.
//!
//! Every folder passed on the command line is either a plugin itself or a
//! parent of plugins, exactly one level deep. Nothing here is fatal: bad
//! folders, broken manifests and incompatible plugins are logged and skipped.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::sandbox::{normalize, SandboxContext};
use super::types::PluginDescriptor;
use crate::engine::AutomationEngine;

/// Walks plugin folders and collects compatible candidates.
#[derive(Debug, Clone)]
pub struct PluginDirectoryScanner {
    /// Directory relative folder arguments are resolved against.
    base_dir: PathBuf,
}

impl PluginDirectoryScanner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Scanner resolving relative folders against the current working directory.
    pub fn from_current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Scan `folders` in order, registering each one as a sandbox root before
    /// looking inside it.
    pub fn scan<E, P>(
        &self,
        folders: &[P],
        sandbox: &mut SandboxContext,
        engine: &E,
    ) -> Vec<PluginDescriptor>
    where
        E: AutomationEngine + ?Sized,
        P: AsRef<Path>,
    {
        let mut descriptors = Vec::new();

        for folder in folders {
            let folder = self.absolute(folder.as_ref());
            match self.scan_folder(&folder, sandbox, engine) {
                Ok(found) => descriptors.extend(found),
                Err(e) => {
                    error!(folder = %folder.display(), error = %e, "Failed to scan plugin folder");
                }
            }
        }

        debug!(count = descriptors.len(), "Plugin scan finished");
        descriptors
    }

    fn absolute(&self, folder: &Path) -> PathBuf {
        if folder.is_absolute() {
            normalize(folder)
        } else {
            normalize(&self.base_dir.join(folder))
        }
    }

    fn scan_folder<E>(
        &self,
        folder: &Path,
        sandbox: &mut SandboxContext,
        engine: &E,
    ) -> std::io::Result<Vec<PluginDescriptor>>
    where
        E: AutomationEngine + ?Sized,
    {
        if !folder.is_dir() {
            error!(folder = %folder.display(), "Plugin folder is not a directory");
            return Ok(Vec::new());
        }

        sandbox.add_allowed_root(folder);
        info!(folder = %folder.display(), "Scanning plugin folder");

        if let Some(descriptor) = inspect_candidate(folder, engine) {
            return Ok(vec![descriptor]);
        }

        let mut children = Vec::new();
        for entry in std::fs::read_dir(folder)? {
            let path = entry?.path();
            if path.is_dir() {
                children.push(path);
            }
        }
        children.sort();

        let found: Vec<PluginDescriptor> = children
            .iter()
            .filter_map(|child| inspect_candidate(child, engine))
            .collect();

        if found.is_empty() {
            warn!(folder = %folder.display(), "No compatible plugins found in folder");
        }

        Ok(found)
    }
}

/// Try one directory as a plugin.
fn inspect_candidate<E>(dir: &Path, engine: &E) -> Option<PluginDescriptor>
where
    E: AutomationEngine + ?Sized,
{
    let metadata = match engine.get_plugin_metadata(dir) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "Not a plugin");
            return None;
        }
    };

    let compatibility = engine.check_plugin_compatibility(&metadata);
    if let Some(message) = &compatibility.message {
        warn!(
            plugin = %metadata.name,
            path = %dir.display(),
            compatible = compatibility.compatible,
            "{}",
            message
        );
    }

    if !compatibility.compatible {
        return None;
    }

    debug!(plugin = %metadata.name, version = %metadata.version, path = %dir.display(), "Found plugin");
    Some(PluginDescriptor::new(dir, metadata))
}
