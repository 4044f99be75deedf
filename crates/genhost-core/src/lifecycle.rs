//! Lifecycle orchestration for the bootstrap process.
//!
//! ```text
//! Uninitialized ──▶ Starting ──▶ Running ──▶ Closing ──▶ Stopped (exit 0)
//!                      │            │
//!                      ▼            ▼
//!                    Failed ◀───────┘  (init failure: -2, crash: -1)
//! ```
//!
//! Startup awaits the engine once; plugin scanning and resolution then run
//! synchronously to completion before the engine is left to run.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{exit_codes, CLOSE_GRACE_PERIOD};
use crate::connection::ConnectionOptions;
use crate::engine::AutomationEngine;
use crate::plugin::{PluginDirectoryScanner, ResolveReport, SandboxContext, VersionResolver};

/// Lifecycle state of the bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Starting,
    Running,
    Closing,
    Stopped,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "Uninitialized",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Closing => "Closing",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// How the process should end.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleOutcome {
    pub state: LifecycleState,
    pub exit_code: i32,
    /// Failure reason, if any.
    pub reason: Option<String>,
    /// Plugins loaded (and failed) during startup.
    pub report: ResolveReport,
}

impl LifecycleOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == exit_codes::OK
    }
}

/// Drives the engine from start to exit.
pub struct LifecycleOrchestrator<E: AutomationEngine + ?Sized> {
    engine: Arc<E>,
    options: ConnectionOptions,
    folders: Vec<PathBuf>,
    scanner: PluginDirectoryScanner,
    resolver: VersionResolver,
    sandbox: SandboxContext,
    state: LifecycleState,
}

impl<E: AutomationEngine + ?Sized> LifecycleOrchestrator<E> {
    pub fn new(engine: Arc<E>, options: ConnectionOptions, folders: Vec<PathBuf>) -> Self {
        let scanner = PluginDirectoryScanner::from_current_dir()
            .unwrap_or_else(|_| PluginDirectoryScanner::new("/"));
        Self {
            engine,
            options,
            folders,
            scanner,
            resolver: VersionResolver::new(),
            sandbox: SandboxContext::default(),
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn with_scanner(mut self, scanner: PluginDirectoryScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_resolver(mut self, resolver: VersionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Sandbox seeded with the install root; plugin folders are added during the scan.
    pub fn with_sandbox(mut self, sandbox: SandboxContext) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn sandbox(&self) -> &SandboxContext {
        &self.sandbox
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Run to completion. The engine is always shut down before returning.
    pub async fn run(mut self) -> LifecycleOutcome {
        let outcome = self.drive().await;
        self.engine.shutdown();
        outcome
    }

    async fn drive(&mut self) -> LifecycleOutcome {
        self.transition(LifecycleState::Starting);

        if let Err(e) = self.engine.start(&self.options).await {
            return self.fail(
                exit_codes::INIT_FAILURE,
                format!("Engine failed to start: {}", e),
                ResolveReport::default(),
            );
        }

        let report = self.load_plugins();
        if report.is_empty() {
            return self.fail(
                exit_codes::INIT_FAILURE,
                "Engine initialization failed: no plugins were loaded".to_string(),
                report,
            );
        }

        self.transition(LifecycleState::Running);

        match self.engine.closed().await {
            Ok(()) => {
                self.transition(LifecycleState::Closing);
                tokio::time::sleep(CLOSE_GRACE_PERIOD).await;
                self.transition(LifecycleState::Stopped);
                LifecycleOutcome {
                    state: self.state,
                    exit_code: exit_codes::OK,
                    reason: None,
                    report,
                }
            }
            Err(e) => self.fail(exit_codes::UNCAUGHT, format!("Engine crashed: {}", e), report),
        }
    }

    /// Scan the configured folders and load one version per plugin.
    pub fn load_plugins(&mut self) -> ResolveReport {
        let descriptors = self
            .scanner
            .scan(self.folders.as_slice(), &mut self.sandbox, self.engine.as_ref());
        let report = self
            .resolver
            .resolve(descriptors, self.engine.as_ref(), &self.sandbox);

        for plugin in &report.loaded {
            info!(plugin = %plugin, "Active plugin");
        }
        if !report.failures.is_empty() {
            warn!(count = report.failures.len(), "Some plugin versions failed to load");
        }
        info!(count = report.loaded_count(), "Plugins loaded");

        report
    }

    fn transition(&mut self, to: LifecycleState) {
        info!(from = %self.state, to = %to, "Lifecycle transition");
        self.state = to;
    }

    fn fail(&mut self, exit_code: i32, reason: String, report: ResolveReport) -> LifecycleOutcome {
        error!(exit_code, "{}", reason);
        self.transition(LifecycleState::Failed);
        LifecycleOutcome {
            state: self.state,
            exit_code,
            reason: Some(reason),
            report,
        }
    }
}
