use crate::config::TransportConfig;
use crate::error::Result;
use std::time::Duration;

/// ICMP echo transport.
#[cfg(unix)]
mod icmp;

/// Platform specific network code.
mod platform;

/// Host name resolution.
pub mod resolve;

/// A network socket.
mod socket;

#[cfg(unix)]
pub use icmp::IcmpTransport;
#[cfg(unix)]
pub use platform::SocketImpl;
pub use socket::Socket;

/// A transport capable of sending ICMP echo requests to a single registered host.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Apply the address family, timeout and time-to-live.
    fn configure(&mut self, config: &TransportConfig) -> Result<()>;

    /// Register the host to probe, replacing any previously registered host.
    fn add_host(&mut self, host: &str) -> Result<()>;

    /// Send one echo request and wait for its reply.
    ///
    /// Returns the number of replies received, which is `0` if the configured
    /// timeout elapsed first.
    fn send(&mut self) -> Result<usize>;

    /// The round-trip latency measured by the most recent `send`, if a reply arrived.
    fn latency(&self) -> Option<Duration>;
}
