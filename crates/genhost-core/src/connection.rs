//! Transport selection for the engine.
//!
//! Exactly one transport is built per process, from the raw CLI values:
//! a local pipe when both handles are given and agree in kind, otherwise an
//! authenticated socket when port, host and password are all usable.

use std::fmt;
use std::path::PathBuf;

/// A raw CLI value, classified the way the command line presents it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Number(u64),
    Text(String),
}

impl RawValue {
    /// Classify a CLI string: all-digit values are numbers, anything else text.
    pub fn classify(value: &str) -> Self {
        match value.trim().parse::<u64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(value.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::classify(value)
    }
}

impl From<u64> for RawValue {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

/// Unvalidated connection arguments.
#[derive(Debug, Clone, Default)]
pub struct RawConnectionArgs {
    pub input: Option<RawValue>,
    pub output: Option<RawValue>,
    pub port: Option<RawValue>,
    pub host: Option<RawValue>,
    pub password: Option<RawValue>,
    pub engine_version: Option<RawValue>,
    pub engine_path: Option<RawValue>,
    pub engine_binary_path: Option<RawValue>,
}

/// One end of a local pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeEndpoint {
    /// Inherited file descriptor.
    Fd(i32),
    /// Named pipe or file path.
    Path(PathBuf),
}

/// The selected transport.
#[derive(Clone, PartialEq, Eq)]
pub enum Transport {
    /// Local pipe. Never encrypted, so no credential is carried.
    Pipe {
        input: PipeEndpoint,
        output: PipeEndpoint,
    },
    /// Authenticated network socket.
    Socket {
        host: String,
        port: u16,
        password: String,
    },
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipe { input, output } => f
                .debug_struct("Pipe")
                .field("input", input)
                .field("output", output)
                .finish(),
            Self::Socket { host, port, .. } => f
                .debug_struct("Socket")
                .field("host", host)
                .field("port", port)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipe { input, output } => {
                write!(f, "pipe (in: {}, out: {})", endpoint_label(input), endpoint_label(output))
            }
            Self::Socket { host, port, .. } => write!(f, "socket {}:{}", host, port),
        }
    }
}

fn endpoint_label(endpoint: &PipeEndpoint) -> String {
    match endpoint {
        PipeEndpoint::Fd(fd) => format!("fd {}", fd),
        PipeEndpoint::Path(path) => path.display().to_string(),
    }
}

/// Options handed to [`AutomationEngine::start`](crate::engine::AutomationEngine::start).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// `None` when neither transport could be built; the engine rejects that at start.
    pub transport: Option<Transport>,
    pub engine_version: Option<String>,
    pub engine_path: Option<PathBuf>,
    pub engine_binary_path: Option<PathBuf>,
}

impl ConnectionOptions {
    pub fn password(&self) -> Option<&str> {
        match &self.transport {
            Some(Transport::Socket { password, .. }) => Some(password.as_str()),
            _ => None,
        }
    }
}

/// Build the connection options. First match wins, with no fallback between
/// transports once one is chosen.
pub fn build_options(raw: &RawConnectionArgs) -> ConnectionOptions {
    let transport = match pipe_transport(raw) {
        PipeSelection::Chosen(pipe) => Some(pipe),
        PipeSelection::Unusable(reason) => {
            tracing::warn!("Pipe handles rejected: {}", reason);
            None
        }
        PipeSelection::NotRequested => socket_transport(raw),
    };

    match &transport {
        Some(t) => tracing::debug!(transport = %t, "Transport selected"),
        None => tracing::debug!("No transport could be built from the arguments"),
    }

    ConnectionOptions {
        transport,
        engine_version: text(&raw.engine_version).map(str::to_string),
        engine_path: text(&raw.engine_path).map(PathBuf::from),
        engine_binary_path: text(&raw.engine_binary_path).map(PathBuf::from),
    }
}

enum PipeSelection {
    NotRequested,
    Chosen(Transport),
    /// Both handles given and of one kind, but not usable as a pipe.
    Unusable(String),
}

fn pipe_transport(raw: &RawConnectionArgs) -> PipeSelection {
    let (Some(input), Some(output)) = (raw.input.as_ref(), raw.output.as_ref()) else {
        return PipeSelection::NotRequested;
    };
    let (input, output) = match (input, output) {
        (RawValue::Number(i), RawValue::Number(o)) => match (fd(*i), fd(*o)) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                return PipeSelection::Unusable(format!(
                    "file descriptors {} and {} must both fit in an i32",
                    i, o
                ))
            }
        },
        (RawValue::Text(i), RawValue::Text(o)) => (
            PipeEndpoint::Path(PathBuf::from(i)),
            PipeEndpoint::Path(PathBuf::from(o)),
        ),
        _ => return PipeSelection::NotRequested,
    };
    PipeSelection::Chosen(Transport::Pipe { input, output })
}

fn fd(raw: u64) -> Option<PipeEndpoint> {
    i32::try_from(raw).ok().map(PipeEndpoint::Fd)
}

fn socket_transport(raw: &RawConnectionArgs) -> Option<Transport> {
    let port = raw.port.as_ref()?.as_number()?;
    let port = u16::try_from(port).ok()?;
    let host = text(&raw.host)?;
    let password = text(&raw.password)?;

    Some(Transport::Socket {
        host: host.to_string(),
        port,
        password: password.to_string(),
    })
}

fn text(value: &Option<RawValue>) -> Option<&str> {
    value.as_ref().and_then(RawValue::as_text)
}
