//! Command-line entry point for the genhost plugin bootstrap.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use genhost_core::config::{self, defaults, env_vars, exit_codes};
use genhost_core::exit;
use genhost_core::plugin::{PluginDirectoryScanner, PluginWhitelist, SandboxContext, VersionResolver};
use genhost_core::{build_options, HostEngine, LifecycleOrchestrator, RawConnectionArgs, RawValue};

/// genhost - Load plugins into the automation engine and connect it to the host.
#[derive(Parser, Debug)]
#[command(name = "genhost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port of the host socket.
    #[arg(short, long, default_value_t = defaults::PORT, env = env_vars::PORT)]
    port: u16,

    /// Host of the host socket.
    #[arg(short = 'H', long, default_value = defaults::HOST, env = env_vars::HOST)]
    host: String,

    /// Password of the host socket.
    #[arg(short = 'P', long, default_value = defaults::PASSWORD, env = env_vars::PASSWORD, hide_env_values = true)]
    password: String,

    /// Input pipe: a file descriptor number or a path. Requires --output.
    #[arg(short, long)]
    input: Option<String>,

    /// Output pipe: a file descriptor number or a path. Requires --input.
    #[arg(short, long)]
    output: Option<String>,

    /// Folder to search for plugins (repeatable).
    #[arg(short = 'f', long = "pluginfolder", required = true)]
    plugin_folders: Vec<PathBuf>,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Version of the host application.
    #[arg(long)]
    engine_version: Option<String>,

    /// Install path of the host application.
    #[arg(long)]
    engine_path: Option<String>,

    /// Binary path of the host application.
    #[arg(long)]
    engine_binary_path: Option<String>,

    /// Comma-separated names of the only plugins allowed to load.
    #[arg(short, long)]
    whitelist: Option<String>,

    /// List the plugins found in the plugin folders and exit.
    #[arg(long)]
    list: bool,
}

impl Args {
    fn raw_connection(&self) -> RawConnectionArgs {
        // Only the pipe handles are ambiguous: a descriptor number or a path.
        let classify = |value: &Option<String>| value.as_deref().map(RawValue::classify);
        let text = |value: &Option<String>| value.clone().map(RawValue::Text);
        RawConnectionArgs {
            input: classify(&self.input),
            output: classify(&self.output),
            port: Some(RawValue::Number(u64::from(self.port))),
            host: Some(RawValue::Text(self.host.clone())),
            password: Some(RawValue::Text(self.password.clone())),
            engine_version: text(&self.engine_version),
            engine_path: text(&self.engine_path),
            engine_binary_path: text(&self.engine_binary_path),
        }
    }

    fn resolver(&self) -> VersionResolver {
        match &self.whitelist {
            Some(list) => {
                let whitelist = PluginWhitelist::parse(list);
                tracing::info!(plugins = ?whitelist.names(), "Whitelist mode");
                VersionResolver::new().with_whitelist(whitelist)
            }
            None => VersionResolver::new(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    exit::install_panic_hook();

    let args = Args::parse();
    init_logging(args.verbose);

    let code = if args.list {
        match list_plugins(&args) {
            Ok(()) => exit_codes::OK,
            Err(e) => init_failure(e),
        }
    } else {
        run_bootstrap(&args).await
    };

    exit::terminate(code)
}

fn init_failure(err: anyhow::Error) -> i32 {
    tracing::error!(exit_code = exit_codes::INIT_FAILURE, "{:#}", err);
    exit_codes::INIT_FAILURE
}

/// Sandbox seeded with the install root, and a scanner anchored at the working directory.
fn bootstrap_context() -> Result<(SandboxContext, PluginDirectoryScanner)> {
    let sandbox = SandboxContext::for_current_exe().context("Failed to locate install root")?;
    let scanner =
        PluginDirectoryScanner::from_current_dir().context("Failed to read working directory")?;
    Ok((sandbox, scanner))
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("genhost={}", level))
            .add_directive(tracing::Level::WARN.into())
    });

    if config::log_json() {
        // JSON format for production/container environments
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(verbose)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

/// Start the engine, load plugins and wait for the host to close.
async fn run_bootstrap(args: &Args) -> i32 {
    let engine = Arc::new(HostEngine::new());
    exit::register_shutdown(engine.clone());

    let (sandbox, scanner) = match bootstrap_context() {
        Ok(context) => context,
        Err(e) => return init_failure(e),
    };
    let options = build_options(&args.raw_connection());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        folders = ?args.plugin_folders,
        "Starting genhost"
    );

    let outcome = LifecycleOrchestrator::new(engine, options, args.plugin_folders.clone())
        .with_scanner(scanner)
        .with_sandbox(sandbox)
        .with_resolver(args.resolver())
        .run()
        .await;

    outcome.exit_code
}

/// Print every plugin candidate, grouped by name in load order.
fn list_plugins(args: &Args) -> Result<()> {
    let engine = HostEngine::new();
    let (mut sandbox, scanner) = bootstrap_context()?;

    let descriptors = scanner.scan(args.plugin_folders.as_slice(), &mut sandbox, &engine);
    let groups = args.resolver().group(descriptors);

    println!("Discovered Plugins");
    println!("==================\n");

    if groups.is_empty() {
        println!("No plugins found.");
        return Ok(());
    }

    for group in &groups {
        println!("{}", group.name);
        for (i, candidate) in group.candidates.iter().enumerate() {
            println!(
                "  {}. {} ({})",
                i + 1,
                candidate.metadata.version,
                candidate.path.display()
            );
        }
    }
    println!("\nTotal: {} plugin(s)", groups.len());

    Ok(())
}
