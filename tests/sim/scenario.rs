use serde::Deserialize;

/// A scripted latency session.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub family: Family,
    pub count: usize,
    /// The session deadline in milliseconds.
    pub deadline_ms: Option<u64>,
    /// The outcome of each send, repeated once exhausted.
    pub echoes: Vec<Echo>,
    pub outcome: Outcome,
}

#[derive(Copy, Clone, Debug, Default, Deserialize)]
pub enum Family {
    #[default]
    Unspecified,
    Ipv4,
    Ipv6,
}

impl From<Family> for hwprobe::AddressFamily {
    fn from(value: Family) -> Self {
        match value {
            Family::Unspecified => Self::Unspecified,
            Family::Ipv4 => Self::Ipv4,
            Family::Ipv6 => Self::Ipv6,
        }
    }
}

/// The scripted result of a single echo request.
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(tag = "tag")]
pub enum Echo {
    /// A reply arrived after `rtt_ms`.
    Reply { rtt_ms: u64 },
    /// No reply arrived before the timeout.
    Lost,
}

/// The expected result of the session.
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(tag = "tag")]
pub enum Outcome {
    Statistics(Expected),
    NoReply { sent: usize },
}

#[derive(Copy, Clone, Debug, Deserialize)]
pub struct Expected {
    pub sent: usize,
    pub received: usize,
    pub average: f64,
    pub stddev: f64,
    pub loss: f64,
}
