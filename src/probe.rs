use crate::builder::Builder;
use crate::config::{defaults, AddressFamily, TransportConfig};
use crate::error::{Error, Result};
use crate::history::History;
#[cfg(unix)]
use crate::net::IcmpTransport;
use crate::net::Transport;
use crate::stats::{self, Statistics};
use crate::types::TimeToLive;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Measures round-trip latency to a single host.
///
/// Each call to [`LatencyProbe::probe`] is an independent session: counters,
/// history and statistics are reset before the first echo request is sent.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use hwprobe::LatencyProbe;
///
/// let mut probe = LatencyProbe::new("192.0.2.1")?;
/// probe.probe(5, None)?;
/// println!(
///     "avg {:.3}s stddev {:.3}s loss {:.0}%",
///     probe.average(),
///     probe.stddev(),
///     probe.loss() * 100.0
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LatencyProbe<T> {
    target: String,
    config: TransportConfig,
    transport: T,
    history: History,
    packets_sent: usize,
    packets_received: usize,
    statistics: Statistics,
}

#[cfg(unix)]
impl LatencyProbe<IcmpTransport> {
    /// Create a probe for `host` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the ICMP transport cannot be configured.
    pub fn new(host: impl Into<String>) -> Result<Self> {
        Builder::new(host).build()
    }
}

impl<T: Transport> LatencyProbe<T> {
    pub(crate) fn from_parts(target: String, config: TransportConfig, transport: T) -> Self {
        Self {
            target,
            config,
            transport,
            history: History::new(),
            packets_sent: 0,
            packets_received: 0,
            statistics: Statistics::default(),
        }
    }

    /// Run a session of the default number of echo requests without a deadline.
    ///
    /// # Errors
    ///
    /// See [`LatencyProbe::probe`].
    pub fn run(&mut self) -> Result<()> {
        self.probe(defaults::DEFAULT_COUNT, None)
    }

    /// Send up to `count` echo requests and compute the session statistics.
    ///
    /// The loop stops early, without error, once `deadline` has elapsed since
    /// the session started. A zero `deadline` is unbounded.
    ///
    /// # Errors
    ///
    /// - `Error::HostResolution` if the target cannot be registered with the transport.
    /// - `Error::Transport` if sending fails; the session is aborted.
    /// - `Error::NoReply` if no reply was received.
    #[instrument(skip(self), fields(target = %self.target), level = "trace")]
    pub fn probe(&mut self, count: usize, deadline: Option<Duration>) -> Result<()> {
        self.transport
            .add_host(&self.target)
            .map_err(|err| err.into_host_resolution(&self.target))?;
        self.reset();
        let deadline = deadline.filter(|deadline| !deadline.is_zero());
        let start = Instant::now();
        for _ in 0..count {
            self.packets_sent += 1;
            let replies = self.transport.send().map_err(Error::into_transport)?;
            self.packets_received += replies;
            let sample = self
                .transport
                .latency()
                .map_or(0.0, |latency| latency.as_secs_f64());
            self.history.push(sample);
            if deadline.is_some_and(|deadline| start.elapsed() >= deadline) {
                tracing::debug!(sent = self.packets_sent, "deadline reached");
                break;
            }
        }
        let Some(statistics) =
            stats::compute(&self.history, self.packets_sent, self.packets_received)
        else {
            tracing::debug!(sent = self.packets_sent, "no replies");
            return Err(Error::NoReply(self.target.clone()));
        };
        tracing::debug!(
            sent = self.packets_sent,
            received = self.packets_received,
            ?statistics
        );
        self.statistics = statistics;
        Ok(())
    }

    fn reset(&mut self) {
        self.history.clear();
        self.packets_sent = 0;
        self.packets_received = 0;
        self.statistics = Statistics::default();
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        self.config.family
    }

    /// The per-echo timeout, `None` if the transport default applies.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }

    #[must_use]
    pub const fn ttl(&self) -> TimeToLive {
        self.config.ttl
    }

    #[must_use]
    pub const fn packets_sent(&self) -> usize {
        self.packets_sent
    }

    #[must_use]
    pub const fn packets_received(&self) -> usize {
        self.packets_received
    }

    /// Average round-trip latency of the last session, in seconds.
    #[must_use]
    pub const fn average(&self) -> f64 {
        self.statistics.average
    }

    /// Standard deviation of the round-trip latency of the last session, in seconds.
    #[must_use]
    pub const fn stddev(&self) -> f64 {
        self.statistics.stddev
    }

    /// Fraction of echo requests of the last session which went unanswered.
    #[must_use]
    pub const fn loss(&self) -> f64 {
        self.statistics.loss
    }

    #[must_use]
    pub const fn statistics(&self) -> Statistics {
        self.statistics
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }
}
