/// The number of latency samples retained by a [`crate::LatencyProbe`].
///
/// Once the history is full the oldest sample is overwritten.
pub const HISTORY_CAPACITY: usize = 1024;

/// The minimum time-to-live value allowed.
pub const MIN_TTL: u32 = 1;

/// The maximum time-to-live value allowed.
pub const MAX_TTL: u32 = 255;

/// The size of the echo request payload in bytes.
pub const ECHO_PAYLOAD_SIZE: usize = 56;

/// The largest packet we expect to receive.
pub const MAX_PACKET_SIZE: usize = 1024;
