use crate::scenario::Echo;
use hwprobe::{Error, Result, Transport, TransportConfig};
use std::time::Duration;

/// A transport which replays scripted echoes instead of touching the network.
#[derive(Debug)]
pub struct ScriptedTransport {
    echoes: Vec<Echo>,
    delay: Duration,
    config: Option<TransportConfig>,
    host: Option<String>,
    sends: usize,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(echoes: Vec<Echo>) -> Self {
        Self {
            echoes,
            delay: Duration::ZERO,
            config: None,
            host: None,
            sends: 0,
            latency: None,
        }
    }

    /// Block for `delay` on every send.
    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    pub const fn config(&self) -> Option<&TransportConfig> {
        self.config.as_ref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub const fn sends(&self) -> usize {
        self.sends
    }
}

impl Transport for ScriptedTransport {
    fn configure(&mut self, config: &TransportConfig) -> Result<()> {
        self.config = Some(*config);
        Ok(())
    }

    fn add_host(&mut self, host: &str) -> Result<()> {
        if host.ends_with(".invalid") {
            return Err(Error::HostResolution {
                host: host.to_string(),
                reason: String::from("no such host"),
            });
        }
        self.host = Some(host.to_string());
        Ok(())
    }

    fn send(&mut self) -> Result<usize> {
        if self.host.is_none() {
            return Err(Error::Transport(String::from("no host registered")));
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let echo = self.echoes[self.sends % self.echoes.len()];
        self.sends += 1;
        self.latency = match echo {
            Echo::Reply { rtt_ms } => Some(Duration::from_millis(rtt_ms)),
            Echo::Lost => None,
        };
        Ok(usize::from(self.latency.is_some()))
    }

    fn latency(&self) -> Option<Duration> {
        self.latency
    }
}
