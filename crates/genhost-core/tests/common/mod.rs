//! Shared fixtures for genhost-core integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use genhost_core::config::manifest;
use genhost_core::plugin::{
    Compatibility, LoadedPlugin, ModuleResolver, PluginDescriptor, PluginMetadata, SandboxContext,
    SandboxResolver,
};
use genhost_core::{AutomationEngine, ConnectionOptions, EngineError, EngineShutdown, PluginLoadError};
use parking_lot::Mutex;

/// Write `<dir>/package.json` declaring `name@version`.
pub fn plugin_dir(dir: &Path, name: &str, version: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let manifest = serde_json::json!({
        "name": name,
        "version": version,
        "main": format!("lib{}.so", name),
    });
    std::fs::write(dir.join(manifest::FILE_NAME), manifest.to_string()).unwrap();
    dir.to_path_buf()
}

/// Engine that reads real manifests, resolves every module through a real
/// [`SandboxResolver`], and fails the loads it is told to.
pub struct FakeEngine {
    resolver: SandboxResolver,
    broken: HashSet<(String, String)>,
    start_error: Option<String>,
    pub attempts: Mutex<Vec<PluginDescriptor>>,
    pub resolved: Mutex<Vec<PathBuf>>,
    pub shutdowns: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            resolver: SandboxResolver::new("/"),
            broken: HashSet::new(),
            start_error: None,
            attempts: Mutex::new(Vec::new()),
            resolved: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn broken(mut self, name: &str, version: &str) -> Self {
        self.broken.insert((name.to_string(), version.to_string()));
        self
    }

    pub fn refusing_start(mut self, reason: &str) -> Self {
        self.start_error = Some(reason.to_string());
        self
    }

    pub fn attempted_versions(&self) -> Vec<String> {
        self.attempts
            .lock()
            .iter()
            .map(|d| format!("{}@{}", d.metadata.name, d.metadata.version))
            .collect()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl EngineShutdown for FakeEngine {
    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AutomationEngine for FakeEngine {
    async fn start(&self, _options: &ConnectionOptions) -> genhost_core::Result<()> {
        match &self.start_error {
            Some(reason) => Err(EngineError::Transport(reason.clone())),
            None => Ok(()),
        }
    }

    fn get_plugin_metadata(&self, path: &Path) -> genhost_core::Result<PluginMetadata> {
        let content = std::fs::read_to_string(path.join(manifest::FILE_NAME))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn check_plugin_compatibility(&self, _metadata: &PluginMetadata) -> Compatibility {
        Compatibility::compatible()
    }

    fn load_plugin(
        &self,
        descriptor: &PluginDescriptor,
        sandbox: &SandboxContext,
    ) -> Result<LoadedPlugin, PluginLoadError> {
        self.attempts.lock().push(descriptor.clone());

        let main = descriptor.metadata.main.clone().unwrap_or_default();
        let module = self.resolver.resolve(&descriptor.path.join(main), sandbox)?;
        self.resolved.lock().push(module);

        let key = (descriptor.metadata.name.clone(), descriptor.metadata.version.clone());
        if self.broken.contains(&key) {
            return Err(PluginLoadError::Rejected(format!("{}@{} threw during load", key.0, key.1)));
        }
        Ok(LoadedPlugin::from_descriptor(descriptor))
    }

    async fn closed(&self) -> genhost_core::Result<()> {
        Ok(())
    }
}
