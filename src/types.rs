use derive_more::{Display, From};

/// `TimeToLive` (ttl) newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Display, From)]
pub struct TimeToLive(pub u8);

/// `Sequence` number newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Display, From)]
pub struct Sequence(pub u16);

impl Sequence {
    /// The next sequence number, wrapping at `u16::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// The ICMP echo identifier newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Display, From)]
pub struct TraceId(pub u16);

impl TraceId {
    /// An identifier derived from the current process id.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_process() -> Self {
        Self((std::process::id() & 0xffff) as u16)
    }
}
