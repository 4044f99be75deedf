//! Process termination.
//!
//! Every exit path, including an uncaught panic, attempts a best-effort
//! engine shutdown before the process ends. The panic hook cannot reach the
//! orchestrator, so the engine is registered here once it exists.

use std::backtrace::Backtrace;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::exit_codes;
use crate::engine::EngineShutdown;

static SHUTDOWN_HOOK: Lazy<Mutex<Option<Arc<dyn EngineShutdown>>>> = Lazy::new(|| Mutex::new(None));

/// Register the engine to shut down on exit, replacing any earlier one.
pub fn register_shutdown(engine: Arc<dyn EngineShutdown>) {
    *SHUTDOWN_HOOK.lock() = Some(engine);
}

/// Shut down the registered engine, if any. Runs at most once per registration.
///
/// Uses `try_lock` so a panic raised while the slot is held cannot deadlock
/// the hook.
pub fn run_registered_shutdown() {
    let engine = SHUTDOWN_HOOK.try_lock().and_then(|mut slot| slot.take());
    if let Some(engine) = engine {
        engine.shutdown();
    }
}

/// Shut down the registered engine and exit with `code`.
pub fn terminate(code: i32) -> ! {
    run_registered_shutdown();
    std::process::exit(code)
}

/// Install the panic hook: log the panic with location and backtrace, shut the
/// engine down and exit with [`exit_codes::UNCAUGHT`].
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "<unknown>".to_string());

        tracing::error!(
            location = %location,
            backtrace = %Backtrace::force_capture(),
            "Uncaught panic: {}",
            message
        );
        terminate(exit_codes::UNCAUGHT);
    }));
}
