//! Shared defaults and environment lookups.
//!
//! Keeps every constant the bootstrap and the CLI agree on in one place so the
//! binary and the library never drift apart.

use std::time::Duration;

/// CLI defaults for the socket transport.
pub mod defaults {
    pub const PORT: u16 = 49494;
    pub const HOST: &str = "127.0.0.1";
    pub const PASSWORD: &str = "password";
}

/// Process exit codes.
pub mod exit_codes {
    /// Engine closed normally.
    pub const OK: i32 = 0;
    /// Uncaught panic or engine crash.
    pub const UNCAUGHT: i32 = -1;
    /// Engine failed to start, or no plugin could be loaded.
    pub const INIT_FAILURE: i32 = -2;
}

/// Environment variable names.
pub mod env_vars {
    pub const LOG_JSON: &str = "GENHOST_LOG_JSON";
    pub const PORT: &str = "GENHOST_PORT";
    pub const HOST: &str = "GENHOST_HOST";
    pub const PASSWORD: &str = "GENHOST_PASSWORD";
}

/// Plugin manifest conventions.
pub mod manifest {
    /// Manifest file looked up inside every candidate plugin folder.
    pub const FILE_NAME: &str = "package.json";
    /// Symbol every native plugin must export, returning its ABI version.
    pub const ABI_SYMBOL: &[u8] = b"genhost_plugin_abi_version";
}

/// ABI version native plugins must report.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Delay between the engine's close event and process exit.
pub const CLOSE_GRACE_PERIOD: Duration = Duration::from_millis(1000);

/// Version of the engine shipped in this crate, used for compatibility checks.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether logs should be emitted as JSON (for container environments).
pub fn log_json() -> bool {
    std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false)
}
