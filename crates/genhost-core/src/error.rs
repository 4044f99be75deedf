//! Error types for the bootstrap.

use std::path::PathBuf;

/// Errors raised by the automation engine collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No transport configured: pass both --input and --output, or a port, host and password")]
    NoTransport,

    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine not started")]
    NotStarted,

    #[error("Invalid plugin manifest at {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other: {0}")]
    Other(String),
}

/// Errors denying a dynamic module resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    #[error("Module path {0} is outside every allowed root")]
    Denied(PathBuf),
}

/// Typed failure of a single plugin load attempt.
#[derive(Debug, thiserror::Error)]
pub enum PluginLoadError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("Plugin library not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load library {path}: {reason}")]
    Library { path: PathBuf, reason: String },

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Incompatible ABI version: expected {expected}, got {got}")]
    IncompatibleAbi { expected: u32, got: u32 },

    #[error("Engine rejected plugin: {0}")]
    Rejected(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
