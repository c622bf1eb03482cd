use crate::config::ConfigField;
use std::fmt::{Display, Formatter};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// A probe error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A probe error.
#[derive(Error, Debug)]
pub enum Error {
    /// An invalid construction parameter.
    #[error("invalid {0}: {1}")]
    Configuration(ConfigField, String),
    /// The ICMP transport failed to construct, configure or send.
    #[error("transport error: {0}")]
    Transport(String),
    /// The target host could not be registered with the transport.
    #[error("could not add host {host}: {reason}")]
    HostResolution { host: String, reason: String },
    /// Every echo request of a session went unanswered.
    #[error("no replies received from {0}")]
    NoReply(String),
    #[error("invalid packet: {0}")]
    PacketError(#[from] trippy_packet::error::Error),
    /// A block device could not be opened or queried.
    #[error("could not open block device {}: {source}", path.display())]
    Device { path: PathBuf, source: io::Error },
    /// The requested reading does not exist for this device or sensor kind.
    #[error("{0}")]
    NotSupported(String),
    /// The requested reading exists but could not be obtained.
    #[error("{0}")]
    NotAvailable(String),
    #[error("could not parse chip name: {0}")]
    InvalidChipName(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl Error {
    /// Classify a failure reported by a transport as a transport error.
    #[must_use]
    pub(crate) fn into_transport(self) -> Self {
        match self {
            Self::Transport(_) => self,
            other => Self::Transport(other.to_string()),
        }
    }

    /// Classify a host registration failure as a host resolution error.
    #[must_use]
    pub(crate) fn into_host_resolution(self, host: &str) -> Self {
        match self {
            Self::HostResolution { .. } => self,
            other => Self::HostResolution {
                host: host.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Custom IO error result.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Custom IO error.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Sendto error for {1}: {0}")]
    SendTo(io::Error, SocketAddr),
    #[error("Failed to {1}: {0}")]
    Other(io::Error, IoOperation),
}

impl IoError {
    /// Get the custom error kind.
    #[cfg(unix)]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SendTo(e, _) | Self::Other(e, _) => ErrorKind::from(e),
        }
    }
}

/// Custom error kind.
///
/// This includes additional error kinds that are not part of the standard [`io::ErrorKind`].
#[derive(Debug, Eq, PartialEq)]
pub enum ErrorKind {
    HostUnreachable,
    NetUnreachable,
    Std(io::ErrorKind),
}

/// Io operation.
#[derive(Debug)]
pub enum IoOperation {
    NewSocket,
    SetNonBlocking,
    Select,
    RecvFrom,
    SetTtl,
    SetUnicastHopsV6,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetNonBlocking => write!(f, "set non-blocking"),
            Self::Select => write!(f, "select"),
            Self::RecvFrom => write!(f, "recv from"),
            Self::SetTtl => write!(f, "set TTL"),
            Self::SetUnicastHopsV6 => write!(f, "set unicast hops v6"),
        }
    }
}
