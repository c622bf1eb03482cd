//! hwprobe - Latency, disk health and hardware sensor probes.
//!
//! This crate provides the measurement primitives used by a metrics
//! collector: ICMP round-trip latency to a host, S.M.A.R.T. health of ATA
//! disks, readings of hwmon hardware sensors and the list of physical mount
//! points.
//!
//! # Example
//!
//! The following example sends five echo requests to a host and prints the
//! session statistics:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use hwprobe::{AddressFamily, Builder};
//! use std::time::Duration;
//!
//! let mut probe = Builder::new("example.com")
//!     .family(AddressFamily::Ipv4)
//!     .timeout(Duration::from_secs(2))
//!     .build()?;
//! probe.probe(5, Some(Duration::from_secs(10)))?;
//! println!("{:?}", probe.statistics());
//! # Ok(())
//! # }
//! ```
//!
//! The following example prints every temperature sensor of the system:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use hwprobe::sensors::{SensorKind, SensorSession};
//!
//! let session = SensorSession::detect()?;
//! for sensor in session.sensors(None)? {
//!     if sensor.kind() == SensorKind::Temperature {
//!         println!("{} {}: {:.1}K", sensor.chip_name(), sensor.label(), sensor.value()?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Builder`] - Build a [`LatencyProbe`].
//! - [`LatencyProbe::probe`] - Run a latency session.
//! - [`disk::BlockDevice`] - Query the health of a disk.
//! - [`sensors::SensorSession`] - Enumerate hardware sensors.
//! - [`mounts::mountpoints`] - List physical mount points.
#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::use_self,
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc
)]
#![deny(unsafe_code)]

mod builder;
mod config;
mod constants;
mod error;
mod history;
mod net;
mod probe;
mod stats;
mod types;

pub mod disk;
pub mod mounts;
pub mod sensors;

pub use builder::Builder;
pub use config::{defaults, AddressFamily, ConfigField, TransportConfig};
pub use constants::{HISTORY_CAPACITY, MAX_TTL, MIN_TTL};
pub use error::{Error, Result};
pub use history::History;
pub use net::resolve::resolve;
#[cfg(unix)]
pub use net::{IcmpTransport, SocketImpl};
pub use net::{Socket, Transport};
pub use probe::LatencyProbe;
pub use stats::Statistics;
pub use types::{Sequence, TimeToLive, TraceId};
