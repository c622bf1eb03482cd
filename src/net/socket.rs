use crate::error::IoResult as Result;
use std::net::SocketAddr;
use std::time::Duration;

/// An ICMP echo socket.
#[cfg_attr(test, mockall::automock)]
pub trait Socket
where
    Self: Sized,
{
    /// Create an IPv4 socket for sending and receiving ICMP echo packets.
    ///
    /// A `raw` socket delivers the IPv4 header along with each received packet.
    fn new_icmp_socket_ipv4(raw: bool) -> Result<Self>;
    /// Create an IPv6 socket for sending and receiving ICMPv6 echo packets.
    fn new_icmp_socket_ipv6(raw: bool) -> Result<Self>;
    fn set_ttl(&mut self, ttl: u32) -> Result<()>;
    fn set_unicast_hops_v6(&mut self, hops: u8) -> Result<()>;
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<()>;
    /// Returns true if the socket becomes readable before the timeout, false otherwise.
    fn is_readable(&mut self, timeout: Duration) -> Result<bool>;
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)>;
}
