use crate::config::AddressFamily;
use crate::error::{Error, Result};
use itertools::{Either, Itertools};
use std::net::IpAddr;
use tracing::instrument;

/// Resolve `host` to a single address of the requested family.
///
/// IP literals are accepted as-is, provided they match `family`. Otherwise the
/// system resolver is queried and the first address of the matching family is
/// returned, with IPv4 preferred when `family` is unspecified.
#[instrument(level = "trace")]
pub fn resolve(host: &str, family: AddressFamily) -> Result<IpAddr> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return select(vec![addr], family).ok_or_else(|| mismatch(host, family));
    }
    let all = dns_lookup::lookup_host(host).map_err(|err| Error::HostResolution {
        host: host.to_string(),
        reason: err.to_string(),
    })?;
    tracing::debug!(host, ?all);
    select(all, family).ok_or_else(|| mismatch(host, family))
}

fn select(all: Vec<IpAddr>, family: AddressFamily) -> Option<IpAddr> {
    let (ipv4, ipv6): (Vec<_>, Vec<_>) = all.into_iter().partition_map(|ip| match ip {
        IpAddr::V4(_) => Either::Left(ip),
        IpAddr::V6(_) => Either::Right(ip),
    });
    match family {
        AddressFamily::Ipv4 => ipv4.first().copied(),
        AddressFamily::Ipv6 => ipv6.first().copied(),
        AddressFamily::Unspecified => ipv4.first().or_else(|| ipv6.first()).copied(),
    }
}

fn mismatch(host: &str, family: AddressFamily) -> Error {
    Error::HostResolution {
        host: host.to_string(),
        reason: format!("no {family} address found"),
    }
}
