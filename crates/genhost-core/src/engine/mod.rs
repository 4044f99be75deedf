//! The automation engine collaborator.
//!
//! The bootstrap never talks to the external host itself. It drives an
//! [`AutomationEngine`]: start it on a transport, ask it what a folder
//! contains, ask it to load plugins, and wait for it to close.
//!
//! ```text
//!   LifecycleOrchestrator ──start──▶ AutomationEngine ◀──pipe/socket──▶ host
//!            │                          ▲      ▲
//!            ▼                          │      │
//!   PluginDirectoryScanner ──metadata───┘      │
//!   VersionResolver ─────────load_plugin───────┘
//! ```

pub mod host;

use std::path::Path;

use async_trait::async_trait;

use crate::connection::ConnectionOptions;
use crate::error::{PluginLoadError, Result};
use crate::plugin::{Compatibility, LoadedPlugin, PluginDescriptor, PluginMetadata, SandboxContext};

pub use host::HostEngine;

/// Synchronous, best-effort shutdown.
///
/// Split from [`AutomationEngine`] so the panic hook can hold it as a trait
/// object. Implementations must tolerate being called more than once.
pub trait EngineShutdown: Send + Sync {
    fn shutdown(&self);
}

/// Interface the bootstrap consumes from the engine.
#[async_trait]
pub trait AutomationEngine: EngineShutdown {
    /// Connect to the external host. The only genuine suspension point of startup.
    async fn start(&self, options: &ConnectionOptions) -> Result<()>;

    /// Read the metadata of a candidate plugin folder. An error means
    /// "not a plugin".
    fn get_plugin_metadata(&self, path: &Path) -> Result<PluginMetadata>;

    /// Judge whether a plugin's requirements match this engine.
    fn check_plugin_compatibility(&self, metadata: &PluginMetadata) -> Compatibility;

    /// Load one plugin version, resolving its modules through `sandbox`.
    fn load_plugin(
        &self,
        descriptor: &PluginDescriptor,
        sandbox: &SandboxContext,
    ) -> std::result::Result<LoadedPlugin, PluginLoadError>;

    /// Resolve when the engine signals close; an error means it crashed.
    async fn closed(&self) -> Result<()>;
}
