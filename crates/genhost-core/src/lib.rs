//! Core of the genhost bootstrap.
//!
//! Discovers plugins on disk, picks one version per plugin name, loads it
//! through a sandboxed module resolver and drives the automation engine from
//! startup to exit.

pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod exit;
pub mod lifecycle;
pub mod plugin;

#[cfg(test)]
mod test_support;

pub use connection::{build_options, ConnectionOptions, PipeEndpoint, RawConnectionArgs, RawValue, Transport};
pub use engine::{AutomationEngine, EngineShutdown, HostEngine};
pub use error::{EngineError, PluginLoadError, Result, SandboxError};
pub use lifecycle::{LifecycleOrchestrator, LifecycleOutcome, LifecycleState};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{defaults, exit_codes};
    pub use crate::connection::{build_options, ConnectionOptions, RawConnectionArgs, RawValue, Transport};
    pub use crate::engine::{AutomationEngine, EngineShutdown, HostEngine};
    pub use crate::error::{EngineError, PluginLoadError, Result, SandboxError};
    pub use crate::lifecycle::{LifecycleOrchestrator, LifecycleOutcome, LifecycleState};
    pub use crate::plugin::{
        Compatibility, LoadedPlugin, ModuleResolver, PluginDescriptor, PluginDirectoryScanner,
        PluginMetadata, PluginWhitelist, ResolveReport, SandboxContext, SandboxResolver,
        VersionResolver,
    };
}
