//! Scripted engine for unit tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::manifest;
use crate::connection::ConnectionOptions;
use crate::engine::{AutomationEngine, EngineShutdown};
use crate::error::{EngineError, PluginLoadError, Result};
use crate::plugin::{Compatibility, LoadedPlugin, PluginDescriptor, PluginMetadata, SandboxContext};

/// Write a `package.json` for `name@version` into `dir`, creating it.
pub fn write_manifest(dir: &Path, name: &str, version: &str) {
    std::fs::create_dir_all(dir).unwrap();
    let manifest = serde_json::json!({ "name": name, "version": version });
    std::fs::write(dir.join(manifest::FILE_NAME), manifest.to_string()).unwrap();
}

/// Engine whose answers are scripted per plugin.
#[derive(Default)]
pub struct ScriptedEngine {
    incompatible: HashSet<String>,
    failing_loads: HashSet<(String, String)>,
    fail_start: bool,
    crash: bool,
    pub attempts: Mutex<Vec<(String, String)>>,
    pub shutdowns: AtomicUsize,
}

impl ScriptedEngine {
    pub fn incompatible(mut self, name: &str) -> Self {
        self.incompatible.insert(name.to_string());
        self
    }

    pub fn failing_load(mut self, name: &str, version: &str) -> Self {
        self.failing_loads
            .insert((name.to_string(), version.to_string()));
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn crashing(mut self) -> Self {
        self.crash = true;
        self
    }

    pub fn attempts(&self) -> Vec<(String, String)> {
        self.attempts.lock().clone()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl EngineShutdown for ScriptedEngine {
    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AutomationEngine for ScriptedEngine {
    async fn start(&self, _options: &ConnectionOptions) -> Result<()> {
        if self.fail_start {
            return Err(EngineError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn get_plugin_metadata(&self, path: &Path) -> Result<PluginMetadata> {
        let content = std::fs::read_to_string(path.join(manifest::FILE_NAME))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn check_plugin_compatibility(&self, metadata: &PluginMetadata) -> Compatibility {
        if self.incompatible.contains(&metadata.name) {
            Compatibility::incompatible(format!("{} requires a newer engine", metadata.name))
        } else {
            Compatibility::compatible()
        }
    }

    fn load_plugin(
        &self,
        descriptor: &PluginDescriptor,
        _sandbox: &SandboxContext,
    ) -> std::result::Result<LoadedPlugin, PluginLoadError> {
        let key = (
            descriptor.metadata.name.clone(),
            descriptor.metadata.version.clone(),
        );
        self.attempts.lock().push(key.clone());

        if self.failing_loads.contains(&key) {
            return Err(PluginLoadError::Rejected(format!("{}@{} is broken", key.0, key.1)));
        }
        Ok(LoadedPlugin::from_descriptor(descriptor))
    }

    async fn closed(&self) -> Result<()> {
        if self.crash {
            return Err(EngineError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}
