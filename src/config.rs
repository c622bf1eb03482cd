use crate::error::{Error, Result};
use crate::types::TimeToLive;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use crate::config::AddressFamily;
    use std::time::Duration;

    /// The default value for `family`.
    pub const DEFAULT_ADDRESS_FAMILY: AddressFamily = AddressFamily::Unspecified;

    /// The default value for `timeout`.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

    /// The default value for `ttl`.
    pub const DEFAULT_TTL: u8 = 255;

    /// The default number of echo requests sent by a session.
    pub const DEFAULT_COUNT: usize = 10;

    /// The per-echo timeout used by a transport when none is configured.
    pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(1);

    /// The default location of the mount table.
    pub const DEFAULT_MOUNT_TABLE: &str = "/etc/mtab";

    /// The default root of the hwmon sysfs class.
    pub const DEFAULT_HWMON_ROOT: &str = "/sys/class/hwmon";
}

/// The address family used to reach a target.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AddressFamily {
    /// Let the resolver choose.
    Unspecified,
    /// IPv4 only.
    Ipv4,
    /// IPv6 only.
    Ipv6,
}

impl Display for AddressFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unspecified => write!(f, "unspecified"),
            Self::Ipv4 => write!(f, "ipv4"),
            Self::Ipv6 => write!(f, "ipv6"),
        }
    }
}

#[cfg(unix)]
impl TryFrom<i32> for AddressFamily {
    type Error = Error;

    /// Map an OS `AF_*` constant.
    fn try_from(value: i32) -> Result<Self> {
        match value {
            nix::libc::AF_UNSPEC => Ok(Self::Unspecified),
            nix::libc::AF_INET => Ok(Self::Ipv4),
            nix::libc::AF_INET6 => Ok(Self::Ipv6),
            other => Err(Error::Configuration(
                ConfigField::AddressFamily,
                format!("{other} is not one of AF_UNSPEC, AF_INET or AF_INET6"),
            )),
        }
    }
}

/// A construction parameter that failed validation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConfigField {
    AddressFamily,
    Timeout,
    TimeToLive,
}

impl Display for ConfigField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressFamily => write!(f, "family"),
            Self::Timeout => write!(f, "timeout"),
            Self::TimeToLive => write!(f, "ttl"),
        }
    }
}

/// Transport configuration.
///
/// A `timeout` of `None` leaves the transport default in place.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TransportConfig {
    pub family: AddressFamily,
    pub timeout: Option<Duration>,
    pub ttl: TimeToLive,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            family: defaults::DEFAULT_ADDRESS_FAMILY,
            timeout: Some(defaults::DEFAULT_TIMEOUT),
            ttl: TimeToLive(defaults::DEFAULT_TTL),
        }
    }
}

impl TransportConfig {
    /// The per-echo timeout the transport should apply.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(defaults::DEFAULT_TRANSPORT_TIMEOUT)
    }
}
