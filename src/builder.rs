use crate::config::{defaults, AddressFamily, ConfigField, TransportConfig};
use crate::constants::{MAX_TTL, MIN_TTL};
use crate::error::{Error, Result};
#[cfg(unix)]
use crate::net::IcmpTransport;
use crate::net::Transport;
use crate::types::TimeToLive;
use crate::LatencyProbe;
use std::time::Duration;

/// Build a latency probe.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use hwprobe::{AddressFamily, Builder};
///
/// let probe = Builder::new("example.com")
///     .family(AddressFamily::Ipv6)
///     .timeout_secs(2.5)
///     .ttl(64)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    host: String,
    family: AddressFamily,
    timeout: f64,
    ttl: u32,
}

impl Builder {
    /// Build a probe builder for a given host name or address.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            family: defaults::DEFAULT_ADDRESS_FAMILY,
            timeout: defaults::DEFAULT_TIMEOUT.as_secs_f64(),
            ttl: u32::from(defaults::DEFAULT_TTL),
        }
    }

    /// Set the address family used to resolve and reach the host.
    #[must_use]
    pub fn family(self, family: AddressFamily) -> Self {
        Self { family, ..self }
    }

    /// Set the time to wait for each echo reply.
    ///
    /// A zero timeout leaves the transport default in place.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: timeout.as_secs_f64(),
            ..self
        }
    }

    /// Set the time to wait for each echo reply, in seconds.
    ///
    /// Negative and non-finite values are rejected by [`Builder::build`].
    #[must_use]
    pub fn timeout_secs(self, timeout: f64) -> Self {
        Self { timeout, ..self }
    }

    /// Set the time-to-live of echo requests, in `1..=255`.
    #[must_use]
    pub fn ttl(self, ttl: u32) -> Self {
        Self { ttl, ..self }
    }

    /// Build a probe over the ICMP transport.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if a parameter is invalid and
    /// `Error::Transport` if the transport cannot be configured.
    #[cfg(unix)]
    pub fn build(self) -> Result<LatencyProbe<IcmpTransport>> {
        self.build_with(IcmpTransport::new())
    }

    /// Build a probe over the given transport.
    ///
    /// Parameters are validated before the transport is configured. On
    /// failure the transport is dropped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if a parameter is invalid and
    /// `Error::Transport` if the transport cannot be configured.
    pub fn build_with<T: Transport>(self, mut transport: T) -> Result<LatencyProbe<T>> {
        let config = self.transport_config()?;
        transport
            .configure(&config)
            .map_err(Error::into_transport)?;
        tracing::debug!(host = %self.host, ?config);
        Ok(LatencyProbe::from_parts(self.host, config, transport))
    }

    fn transport_config(&self) -> Result<TransportConfig> {
        let timeout = Duration::try_from_secs_f64(self.timeout).map_err(|err| {
            Error::Configuration(ConfigField::Timeout, format!("{}: {err}", self.timeout))
        })?;
        let timeout = (!timeout.is_zero()).then_some(timeout);
        if !(MIN_TTL..=MAX_TTL).contains(&self.ttl) {
            return Err(Error::Configuration(
                ConfigField::TimeToLive,
                format!("{} not in {MIN_TTL}..={MAX_TTL}", self.ttl),
            ));
        }
        let ttl = u8::try_from(self.ttl)
            .map_err(|err| Error::Configuration(ConfigField::TimeToLive, err.to_string()))?;
        Ok(TransportConfig {
            family: self.family,
            timeout,
            ttl: TimeToLive(ttl),
        })
    }
}
