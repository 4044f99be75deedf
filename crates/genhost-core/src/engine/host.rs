//! Host engine: the concrete [`AutomationEngine`] behind the `genhost` binary.
//!
//! It owns the transport to the external host, reads `package.json`
//! manifests, checks engine requirements with semver ranges and loads native
//! plugin libraries through a [`ModuleResolver`]. The host wire protocol lives
//! above this layer; the engine only tracks the inbound stream so it can
//! report close (EOF) or crash (read error).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use semver::{Version, VersionReq};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AutomationEngine, EngineShutdown};
use crate::config::{self, manifest, PLUGIN_ABI_VERSION};
use crate::connection::{ConnectionOptions, PipeEndpoint, Transport};
use crate::error::{EngineError, PluginLoadError, Result};
use crate::plugin::{
    Compatibility, LoadedPlugin, ModuleResolver, PluginDescriptor, PluginMetadata, SandboxContext,
    SandboxResolver,
};

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Signature of the ABI probe every native plugin exports.
type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Live connection to the external host.
struct Session {
    reader: JoinHandle<()>,
    /// Held open for the protocol layer; dropped on shutdown.
    _writer: BoxedWriter,
}

/// Engine connecting to the external host over a pipe or a socket.
pub struct HostEngine {
    version: Version,
    resolver: Box<dyn ModuleResolver>,
    session: Mutex<Option<Session>>,
    closed_rx: tokio::sync::Mutex<Option<oneshot::Receiver<Result<()>>>>,
    /// Loaded libraries, kept alive for the rest of the process.
    libraries: Mutex<Vec<libloading::Library>>,
    shut_down: AtomicBool,
}

impl HostEngine {
    /// Engine reporting this crate's version, resolving modules against the
    /// filesystem root.
    pub fn new() -> Self {
        let version = Version::parse(config::ENGINE_VERSION).unwrap_or_else(|_| Version::new(0, 0, 0));
        Self {
            version,
            resolver: Box::new(SandboxResolver::new("/")),
            session: Mutex::new(None),
            closed_rx: tokio::sync::Mutex::new(None),
            libraries: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Override the version used for compatibility checks.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Replace the module resolver used by `load_plugin`.
    pub fn with_resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Number of plugin libraries currently held.
    pub fn loaded_library_count(&self) -> usize {
        self.libraries.lock().len()
    }

    async fn connect(transport: &Transport) -> Result<(BoxedReader, BoxedWriter)> {
        match transport {
            Transport::Pipe {
                input: PipeEndpoint::Fd(input),
                output: PipeEndpoint::Fd(output),
            } if input == output => shared_fd_pipe(*input),
            Transport::Pipe { input, output } => {
                let reader = open_pipe_reader(input).await?;
                let writer = open_pipe_writer(output).await?;
                Ok((reader, writer))
            }
            Transport::Socket { host, port, .. } => {
                let stream = tokio::net::TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|e| {
                        EngineError::Transport(format!("connect to {}:{} failed: {}", host, port, e))
                    })?;
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer)))
            }
        }
    }
}

impl Default for HostEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineShutdown for HostEngine {
    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(session) = self.session.lock().take() {
            session.reader.abort();
        }
        info!("Engine shut down");
    }
}

#[async_trait]
impl AutomationEngine for HostEngine {
    async fn start(&self, options: &ConnectionOptions) -> Result<()> {
        if self.session.lock().is_some() {
            return Err(EngineError::AlreadyStarted);
        }
        let transport = options.transport.as_ref().ok_or(EngineError::NoTransport)?;

        let (reader, writer) = Self::connect(transport).await?;
        let (tx, rx) = oneshot::channel();
        let reader = tokio::spawn(watch_inbound(reader, tx));

        {
            let mut session = self.session.lock();
            if session.is_some() {
                reader.abort();
                return Err(EngineError::AlreadyStarted);
            }
            *session = Some(Session {
                reader,
                _writer: writer,
            });
        }
        *self.closed_rx.lock().await = Some(rx);

        info!(
            transport = %transport,
            engine_version = %self.version,
            host_version = options.engine_version.as_deref().unwrap_or("unknown"),
            "Engine started"
        );
        if let Some(path) = &options.engine_path {
            debug!(path = %path.display(), "Host install path");
        }
        if let Some(path) = &options.engine_binary_path {
            debug!(path = %path.display(), "Host binary path");
        }
        Ok(())
    }

    fn get_plugin_metadata(&self, path: &Path) -> Result<PluginMetadata> {
        let manifest_path = path.join(manifest::FILE_NAME);
        let content = std::fs::read_to_string(&manifest_path)?;
        let metadata: PluginMetadata =
            serde_json::from_str(&content).map_err(|e| EngineError::InvalidManifest {
                path: manifest_path.clone(),
                reason: e.to_string(),
            })?;

        if metadata.name.trim().is_empty() {
            return Err(EngineError::InvalidManifest {
                path: manifest_path,
                reason: "empty plugin name".to_string(),
            });
        }
        Ok(metadata)
    }

    fn check_plugin_compatibility(&self, metadata: &PluginMetadata) -> Compatibility {
        let Some(requirement) = &metadata.engine_requirement else {
            return Compatibility::compatible().with_message(format!(
                "Plugin {} does not declare a required engine version",
                metadata.name
            ));
        };

        match VersionReq::parse(requirement) {
            Ok(req) if req.matches(&self.version) => Compatibility::compatible(),
            Ok(_) => Compatibility::incompatible(format!(
                "Plugin {} requires engine {}, but this is {}",
                metadata.name, requirement, self.version
            )),
            Err(e) => Compatibility::incompatible(format!(
                "Plugin {} declares an invalid engine requirement {:?}: {}",
                metadata.name, requirement, e
            )),
        }
    }

    fn load_plugin(
        &self,
        descriptor: &PluginDescriptor,
        sandbox: &SandboxContext,
    ) -> std::result::Result<LoadedPlugin, PluginLoadError> {
        let requested = descriptor.path.join(library_file(&descriptor.metadata));
        let library_path = self.resolver.resolve(&requested, sandbox)?;
        if !library_path.is_file() {
            return Err(PluginLoadError::NotFound(library_path));
        }

        // SAFETY: the path passed the sandbox; running the library's
        // initializers is the point of loading a plugin.
        let library = unsafe { libloading::Library::new(&library_path) }.map_err(|e| {
            PluginLoadError::Library {
                path: library_path.clone(),
                reason: e.to_string(),
            }
        })?;

        let abi_version = {
            // SAFETY: the symbol is declared by the plugin ABI as `extern "C" fn() -> u32`.
            let probe = unsafe { library.get::<AbiVersionFn>(manifest::ABI_SYMBOL) }.map_err(
                |_| PluginLoadError::SymbolNotFound(String::from_utf8_lossy(manifest::ABI_SYMBOL).into_owned()),
            )?;
            // SAFETY: see above; the probe takes no arguments and has no preconditions.
            unsafe { probe() }
        };
        if abi_version != PLUGIN_ABI_VERSION {
            return Err(PluginLoadError::IncompatibleAbi {
                expected: PLUGIN_ABI_VERSION,
                got: abi_version,
            });
        }

        self.libraries.lock().push(library);
        debug!(path = %library_path.display(), "Plugin library loaded");
        Ok(LoadedPlugin::from_descriptor(descriptor))
    }

    async fn closed(&self) -> Result<()> {
        let rx = self.closed_rx.lock().await.take().ok_or(EngineError::NotStarted)?;
        match rx.await {
            Ok(result) => result,
            // Watcher aborted by shutdown
            Err(_) => Ok(()),
        }
    }
}

/// Library file for a plugin: the manifest's `main`, or the platform library
/// name derived from the plugin name.
fn library_file(metadata: &PluginMetadata) -> PathBuf {
    match &metadata.main {
        Some(main) => PathBuf::from(main),
        None => PathBuf::from(libloading::library_filename(&metadata.name)),
    }
}

/// Drain the inbound stream and report how it ended.
async fn watch_inbound(mut reader: BoxedReader, tx: oneshot::Sender<Result<()>>) {
    let mut buf = vec![0u8; 8 * 1024];
    let outcome = loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                info!("Host closed the connection");
                break Ok(());
            }
            Ok(n) => debug!(bytes = n, "Inbound data"),
            Err(e) => {
                warn!(error = %e, "Inbound stream failed");
                break Err(EngineError::Transport(e.to_string()));
            }
        }
    };
    let _ = tx.send(outcome);
}

async fn open_pipe_reader(endpoint: &PipeEndpoint) -> Result<BoxedReader> {
    match endpoint {
        PipeEndpoint::Path(path) => {
            let file = tokio::fs::File::open(path).await.map_err(|e| {
                EngineError::Transport(format!("open input {}: {}", path.display(), e))
            })?;
            Ok(Box::new(file))
        }
        PipeEndpoint::Fd(fd) => Ok(Box::new(file_from_fd(*fd)?)),
    }
}

async fn open_pipe_writer(endpoint: &PipeEndpoint) -> Result<BoxedWriter> {
    match endpoint {
        PipeEndpoint::Path(path) => {
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(path)
                .await
                .map_err(|e| {
                    EngineError::Transport(format!("open output {}: {}", path.display(), e))
                })?;
            Ok(Box::new(file))
        }
        PipeEndpoint::Fd(fd) => Ok(Box::new(file_from_fd(*fd)?)),
    }
}

fn file_from_fd(fd: i32) -> Result<tokio::fs::File> {
    Ok(tokio::fs::File::from_std(std_file_from_fd(fd)?))
}

/// One descriptor serving both directions. The writer gets its own duplicate
/// so each half closes exactly one descriptor.
fn shared_fd_pipe(fd: i32) -> Result<(BoxedReader, BoxedWriter)> {
    let reader = std_file_from_fd(fd)?;
    let writer = reader.try_clone().map_err(|e| {
        EngineError::Transport(format!("duplicate file descriptor {}: {}", fd, e))
    })?;
    Ok((
        Box::new(tokio::fs::File::from_std(reader)),
        Box::new(tokio::fs::File::from_std(writer)),
    ))
}

#[cfg(unix)]
fn std_file_from_fd(fd: i32) -> Result<std::fs::File> {
    use std::os::unix::io::FromRawFd;

    // SAFETY: the descriptor was handed to this process by the host for its
    // exclusive use and is wrapped exactly once.
    Ok(unsafe { std::fs::File::from_raw_fd(fd) })
}

#[cfg(not(unix))]
fn std_file_from_fd(fd: i32) -> Result<std::fs::File> {
    Err(EngineError::UnsupportedTransport(format!(
        "file descriptor {} pipes are only supported on unix",
        fd
    )))
}
