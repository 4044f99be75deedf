//! Plugin discovery, version resolution and sandboxed loading.
//!
//! # Pipeline
//!
//! ```text
//! folders ──▶ PluginDirectoryScanner ──▶ [PluginDescriptor] ──▶ VersionResolver ──▶ ResolveReport
//!                    │ add_allowed_root                               │ load_plugin
//!                    ▼                                                ▼
//!              SandboxContext ◀──────────── ModuleResolver ◀──── AutomationEngine
//! ```
//!
//! A folder is a plugin when the engine can read its metadata and judges it
//! compatible. Otherwise each direct child folder is tried. Candidates are
//! grouped by name and loaded newest version first until one succeeds.

pub mod resolver;
pub mod sandbox;
pub mod scanner;
pub mod types;
pub mod whitelist;

pub use resolver::{
    parse_version, precedence, LoadFailure, PluginGroup, ResolveReport, VersionResolver,
};
pub use sandbox::{ModuleResolver, SandboxContext, SandboxResolver};
pub use scanner::PluginDirectoryScanner;
pub use types::{Compatibility, LoadedPlugin, PluginDescriptor, PluginMetadata};
pub use whitelist::PluginWhitelist;
