use crate::config::{AddressFamily, TransportConfig};
use crate::constants::{ECHO_PAYLOAD_SIZE, MAX_PACKET_SIZE};
use crate::error::{Error, ErrorKind, IoResult, Result};
use crate::net::platform::SocketImpl;
use crate::net::resolve::resolve;
use crate::net::socket::Socket;
use crate::net::Transport;
use crate::types::{Sequence, TimeToLive, TraceId};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::instrument;
use trippy_packet::checksum::icmp_ipv4_checksum;
use trippy_packet::icmpv4;
use trippy_packet::icmpv6;
use trippy_packet::ipv4::Ipv4Packet;

/// The size of an echo request, header included.
const ECHO_REQUEST_SIZE: usize = icmpv4::IcmpPacket::minimum_packet_size() + ECHO_PAYLOAD_SIZE;

/// An ICMP echo transport for a single host.
///
/// An unprivileged datagram ICMP socket is tried first, falling back to a raw
/// socket. The socket is opened when the transport is configured with an
/// explicit address family, or on the first send otherwise.
#[derive(Debug)]
pub struct IcmpTransport<S = SocketImpl> {
    config: TransportConfig,
    channel: Option<Channel<S>>,
    target: Option<IpAddr>,
    identifier: TraceId,
    sequence: Sequence,
    latency: Option<Duration>,
}

#[derive(Debug)]
struct Channel<S> {
    socket: S,
    family: AddressFamily,
    raw: bool,
}

impl<S: Socket> IcmpTransport<S> {
    /// Create an unconfigured transport identified by the current process.
    #[must_use]
    pub fn new() -> Self {
        Self::with_identifier(TraceId::from_process(), Sequence(0))
    }

    /// Create an unconfigured transport with an explicit identifier and initial sequence.
    #[must_use]
    pub fn with_identifier(identifier: TraceId, sequence: Sequence) -> Self {
        Self {
            config: TransportConfig::default(),
            channel: None,
            target: None,
            identifier,
            sequence,
            latency: None,
        }
    }

    /// The address of the registered host.
    #[must_use]
    pub const fn target(&self) -> Option<IpAddr> {
        self.target
    }

    fn ensure_channel(&mut self, family: AddressFamily) -> Result<&mut Channel<S>> {
        let stale = self
            .channel
            .as_ref()
            .is_none_or(|channel| channel.family != family);
        if stale {
            self.channel = Some(Channel::open(family, self.config.ttl)?);
        }
        self.channel
            .as_mut()
            .ok_or_else(|| Error::Transport(String::from("socket not open")))
    }
}

impl<S: Socket> Default for IcmpTransport<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Socket> Channel<S> {
    #[instrument(level = "trace")]
    fn open(family: AddressFamily, ttl: TimeToLive) -> Result<Self> {
        let new_socket: fn(bool) -> IoResult<S> = match family {
            AddressFamily::Ipv6 => S::new_icmp_socket_ipv6,
            AddressFamily::Ipv4 | AddressFamily::Unspecified => S::new_icmp_socket_ipv4,
        };
        let (mut socket, raw) = match new_socket(false) {
            Ok(socket) => (socket, false),
            Err(err) => {
                tracing::debug!(%err, "datagram ICMP socket unavailable, trying raw");
                (new_socket(true)?, true)
            }
        };
        match family {
            AddressFamily::Ipv6 => socket.set_unicast_hops_v6(ttl.0)?,
            AddressFamily::Ipv4 | AddressFamily::Unspecified => {
                socket.set_ttl(u32::from(ttl.0))?;
            }
        }
        Ok(Self {
            socket,
            family,
            raw,
        })
    }
}

impl<S: Socket> Transport for IcmpTransport<S> {
    #[instrument(skip(self), level = "trace")]
    fn configure(&mut self, config: &TransportConfig) -> Result<()> {
        self.config = *config;
        self.channel = None;
        match config.family {
            AddressFamily::Ipv4 | AddressFamily::Ipv6 => {
                self.ensure_channel(config.family)?;
            }
            AddressFamily::Unspecified => {}
        }
        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    fn add_host(&mut self, host: &str) -> Result<()> {
        let addr = resolve(host, self.config.family)?;
        tracing::debug!(host, %addr);
        self.target = Some(addr);
        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    fn send(&mut self) -> Result<usize> {
        let addr = self
            .target
            .ok_or_else(|| Error::Transport(String::from("no host registered")))?;
        let family = match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        };
        let identifier = self.identifier;
        let sequence = self.sequence;
        let timeout = self.config.effective_timeout();
        self.sequence = sequence.next();
        self.latency = None;
        let mut echo_buf = [0_u8; ECHO_REQUEST_SIZE];
        make_echo_request(&mut echo_buf, family, identifier, sequence)?;
        let channel = self.ensure_channel(family)?;
        let sent_at = Instant::now();
        match channel.socket.send_to(&echo_buf, SocketAddr::new(addr, 0)) {
            Ok(()) => {}
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::HostUnreachable | ErrorKind::NetUnreachable
                ) =>
            {
                tracing::debug!(%addr, sequence = sequence.0, %err, "echo request not sent");
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        }
        let mut recv_buf = [0_u8; MAX_PACKET_SIZE];
        let latency = loop {
            let elapsed = sent_at.elapsed();
            if elapsed >= timeout {
                tracing::debug!(%addr, sequence = sequence.0, "echo request timed out");
                break None;
            }
            if !channel.socket.is_readable(timeout - elapsed)? {
                continue;
            }
            let bytes_read = match channel.socket.recv_from(&mut recv_buf) {
                Ok((bytes_read, _)) => bytes_read,
                Err(err) if err.kind() == ErrorKind::Std(io::ErrorKind::WouldBlock) => continue,
                Err(err) => return Err(err.into()),
            };
            match extract_echo_reply(&recv_buf[..bytes_read], channel.family, channel.raw) {
                Ok(Some((reply_id, reply_seq)))
                    if reply_seq == sequence && (!channel.raw || reply_id == identifier) =>
                {
                    let latency = sent_at.elapsed();
                    tracing::debug!(%addr, sequence = sequence.0, ?latency);
                    break Some(latency);
                }
                Ok(_) => {}
                Err(err) => tracing::trace!(%err, "ignoring malformed packet"),
            }
        };
        self.latency = latency;
        Ok(usize::from(latency.is_some()))
    }

    fn latency(&self) -> Option<Duration> {
        self.latency
    }
}

/// Write an echo request with a zeroed payload into `buf`.
///
/// The ICMPv6 checksum covers a pseudo header and is left for the kernel to fill.
fn make_echo_request(
    buf: &mut [u8],
    family: AddressFamily,
    identifier: TraceId,
    sequence: Sequence,
) -> Result<()> {
    match family {
        AddressFamily::Ipv6 => {
            let mut icmp = icmpv6::echo_request::EchoRequestPacket::new(buf)?;
            icmp.set_icmp_type(icmpv6::IcmpType::EchoRequest);
            icmp.set_icmp_code(icmpv6::IcmpCode(0));
            icmp.set_identifier(identifier.0);
            icmp.set_sequence(sequence.0);
        }
        AddressFamily::Ipv4 | AddressFamily::Unspecified => {
            let mut icmp = icmpv4::echo_request::EchoRequestPacket::new(buf)?;
            icmp.set_icmp_type(icmpv4::IcmpType::EchoRequest);
            icmp.set_icmp_code(icmpv4::IcmpCode(0));
            icmp.set_identifier(identifier.0);
            icmp.set_sequence(sequence.0);
            icmp.set_checksum(icmp_ipv4_checksum(icmp.packet()));
        }
    }
    Ok(())
}

/// Extract the identifier and sequence of an echo reply.
///
/// Returns `None` for any other ICMP message. Raw IPv4 sockets deliver the IP
/// header which is skipped.
fn extract_echo_reply(
    buf: &[u8],
    family: AddressFamily,
    raw: bool,
) -> Result<Option<(TraceId, Sequence)>> {
    match family {
        AddressFamily::Ipv6 => {
            let icmp = icmpv6::IcmpPacket::new_view(buf)?;
            if !matches!(icmp.get_icmp_type(), icmpv6::IcmpType::EchoReply) {
                return Ok(None);
            }
            let reply = icmpv6::echo_reply::EchoReplyPacket::new_view(icmp.packet())?;
            Ok(Some((
                TraceId(reply.get_identifier()),
                Sequence(reply.get_sequence()),
            )))
        }
        AddressFamily::Ipv4 | AddressFamily::Unspecified => {
            let ipv4;
            let icmp = if raw {
                ipv4 = Ipv4Packet::new_view(buf)?;
                icmpv4::IcmpPacket::new_view(ipv4.payload())?
            } else {
                icmpv4::IcmpPacket::new_view(buf)?
            };
            if !matches!(icmp.get_icmp_type(), icmpv4::IcmpType::EchoReply) {
                return Ok(None);
            }
            let reply = icmpv4::echo_reply::EchoReplyPacket::new_view(icmp.packet())?;
            Ok(Some((
                TraceId(reply.get_identifier()),
                Sequence(reply.get_sequence()),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IoError, IoOperation};
    use crate::mocket_recv_from;
    use crate::net::socket::MockSocket;
    use mockall::predicate;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::Mutex;
    use test_case::test_case;

    static MTX: Mutex<()> = Mutex::new(());

    const IDENTIFIER: TraceId = TraceId(1234);
    const SEQUENCE: Sequence = Sequence(33434);
    const ECHO_REQUEST_V4: [u8; 64] = hex_literal::hex!(
        "
        08 00 70 93 04 d2 82 9a 00 00 00 00 00 00 00 00
        00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
        00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
        00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
        "
    );
    const ECHO_REPLY_V4: [u8; 64] = hex_literal::hex!(
        "
        00 00 78 93 04 d2 82 9a 00 00 00 00 00 00 00 00
        00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
        00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
        00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
        "
    );

    fn config(family: AddressFamily) -> TransportConfig {
        TransportConfig {
            family,
            timeout: Some(Duration::from_millis(50)),
            ttl: TimeToLive(64),
        }
    }

    fn permission_denied() -> IoError {
        IoError::Other(
            io::Error::from(io::ErrorKind::PermissionDenied),
            IoOperation::NewSocket,
        )
    }

    fn transport() -> IcmpTransport<MockSocket> {
        IcmpTransport::with_identifier(IDENTIFIER, SEQUENCE)
    }

    #[test]
    fn test_configure_ipv4_opens_datagram_socket() -> anyhow::Result<()> {
        let _m = MTX.lock();
        let ctx = MockSocket::new_icmp_socket_ipv4_context();
        ctx.expect()
            .with(predicate::eq(false))
            .times(1)
            .returning(|_| {
                let mut mocket = MockSocket::new();
                mocket
                    .expect_set_ttl()
                    .with(predicate::eq(64))
                    .times(1)
                    .returning(|_| Ok(()));
                Ok(mocket)
            });
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Ipv4))?;
        assert!(transport.channel.as_ref().is_some_and(|c| !c.raw));
        Ok(())
    }

    #[test]
    fn test_configure_falls_back_to_raw_socket() -> anyhow::Result<()> {
        let _m = MTX.lock();
        let ctx = MockSocket::new_icmp_socket_ipv6_context();
        ctx.expect()
            .with(predicate::eq(false))
            .times(1)
            .returning(|_| Err(permission_denied()));
        ctx.expect()
            .with(predicate::eq(true))
            .times(1)
            .returning(|_| {
                let mut mocket = MockSocket::new();
                mocket
                    .expect_set_unicast_hops_v6()
                    .with(predicate::eq(64))
                    .times(1)
                    .returning(|_| Ok(()));
                Ok(mocket)
            });
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Ipv6))?;
        assert!(transport.channel.as_ref().is_some_and(|c| c.raw));
        Ok(())
    }

    #[test]
    fn test_configure_without_socket_is_transport_error() {
        let _m = MTX.lock();
        let ctx = MockSocket::new_icmp_socket_ipv4_context();
        ctx.expect().times(2).returning(|_| Err(permission_denied()));
        let mut transport = transport();
        let err = transport
            .configure(&config(AddressFamily::Ipv4))
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_configure_unspecified_defers_socket() -> anyhow::Result<()> {
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Unspecified))?;
        assert!(transport.channel.is_none());
        Ok(())
    }

    #[test]
    fn test_add_host_replaces_target() -> anyhow::Result<()> {
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Unspecified))?;
        transport.add_host("192.0.2.1")?;
        transport.add_host("::1")?;
        assert_eq!(Some(IpAddr::V6(Ipv6Addr::LOCALHOST)), transport.target());
        Ok(())
    }

    #[test]
    fn test_send_without_host() {
        let mut transport = transport();
        let err = transport.send().unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_send_ipv4_echo_reply() -> anyhow::Result<()> {
        let _m = MTX.lock();
        let dest_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 0);
        let ctx = MockSocket::new_icmp_socket_ipv4_context();
        ctx.expect().times(1).returning(move |_| {
            let mut mocket = MockSocket::new();
            mocket.expect_set_ttl().returning(|_| Ok(()));
            mocket
                .expect_send_to()
                .with(
                    predicate::eq(ECHO_REQUEST_V4),
                    predicate::eq(dest_addr),
                )
                .times(1)
                .returning(|_, _| Ok(()));
            mocket.expect_is_readable().returning(|_| Ok(true));
            mocket
                .expect_recv_from()
                .times(1)
                .returning(mocket_recv_from!(ECHO_REPLY_V4, dest_addr));
            Ok(mocket)
        });
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Unspecified))?;
        transport.add_host("192.0.2.1")?;
        assert_eq!(1, transport.send()?);
        assert!(transport.latency().is_some());
        Ok(())
    }

    #[test]
    fn test_send_raw_ipv4_skips_foreign_identifier() -> anyhow::Result<()> {
        let _m = MTX.lock();
        let foreign = hex_literal::hex!(
            "
            45 20 00 54 00 00 00 00 3b 01 50 02 c0 00 02 01
            c0 a8 01 15 00 00 09 0f 75 d7 82 9a 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00
            "
        );
        let ours = hex_literal::hex!(
            "
            45 20 00 54 00 00 00 00 3b 01 50 02 c0 00 02 01
            c0 a8 01 15 00 00 78 93 04 d2 82 9a 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00
            "
        );
        let dest_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 0);
        let ctx = MockSocket::new_icmp_socket_ipv4_context();
        ctx.expect()
            .with(predicate::eq(false))
            .returning(|_| Err(permission_denied()));
        ctx.expect()
            .with(predicate::eq(true))
            .times(1)
            .returning(move |_| {
                let mut mocket = MockSocket::new();
                mocket.expect_set_ttl().returning(|_| Ok(()));
                mocket.expect_send_to().times(1).returning(|_, _| Ok(()));
                mocket.expect_is_readable().returning(|_| Ok(true));
                let mut reads = 0;
                mocket.expect_recv_from().times(2).returning(move |buf| {
                    reads += 1;
                    let packet = if reads == 1 { &foreign } else { &ours };
                    buf[..packet.len()].copy_from_slice(packet);
                    Ok((packet.len(), Some(dest_addr)))
                });
                Ok(mocket)
            });
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Ipv4))?;
        transport.add_host("192.0.2.1")?;
        assert_eq!(1, transport.send()?);
        Ok(())
    }

    #[test]
    fn test_send_times_out() -> anyhow::Result<()> {
        let _m = MTX.lock();
        let ctx = MockSocket::new_icmp_socket_ipv4_context();
        ctx.expect().times(1).returning(|_| {
            let mut mocket = MockSocket::new();
            mocket.expect_set_ttl().returning(|_| Ok(()));
            mocket.expect_send_to().times(1).returning(|_, _| Ok(()));
            mocket.expect_is_readable().returning(|_| Ok(false));
            mocket.expect_recv_from().never();
            Ok(mocket)
        });
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Ipv4))?;
        transport.add_host("192.0.2.1")?;
        assert_eq!(0, transport.send()?);
        assert_eq!(None, transport.latency());
        Ok(())
    }

    #[test]
    fn test_send_ignores_stale_sequence() -> anyhow::Result<()> {
        let _m = MTX.lock();
        let dest_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 0);
        let ctx = MockSocket::new_icmp_socket_ipv4_context();
        ctx.expect().times(1).returning(move |_| {
            let mut mocket = MockSocket::new();
            mocket.expect_set_ttl().returning(|_| Ok(()));
            mocket.expect_send_to().returning(|_, _| Ok(()));
            let mut polls = 0;
            mocket.expect_is_readable().returning(move |_| {
                polls += 1;
                Ok(polls == 1)
            });
            mocket
                .expect_recv_from()
                .times(1)
                .returning(mocket_recv_from!(ECHO_REPLY_V4, dest_addr));
            Ok(mocket)
        });
        let mut transport = IcmpTransport::<MockSocket>::with_identifier(IDENTIFIER, SEQUENCE.next());
        transport.configure(&config(AddressFamily::Ipv4))?;
        transport.add_host("192.0.2.1")?;
        assert_eq!(0, transport.send()?);
        Ok(())
    }

    #[test]
    fn test_send_ipv6_echo_request() -> anyhow::Result<()> {
        let _m = MTX.lock();
        let expected_send_to_buf = hex_literal::hex!(
            "
            80 00 00 00 04 d2 82 9a 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            "
        );
        let reply = hex_literal::hex!(
            "
            81 00 00 00 04 d2 82 9a 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            "
        );
        let dest_addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 0);
        let ctx = MockSocket::new_icmp_socket_ipv6_context();
        ctx.expect().times(1).returning(move |_| {
            let mut mocket = MockSocket::new();
            mocket
                .expect_set_unicast_hops_v6()
                .with(predicate::eq(64))
                .returning(|_| Ok(()));
            mocket
                .expect_send_to()
                .with(
                    predicate::eq(expected_send_to_buf),
                    predicate::eq(dest_addr),
                )
                .times(1)
                .returning(|_, _| Ok(()));
            mocket.expect_is_readable().returning(|_| Ok(true));
            mocket
                .expect_recv_from()
                .times(1)
                .returning(mocket_recv_from!(reply, dest_addr));
            Ok(mocket)
        });
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Unspecified))?;
        transport.add_host("::1")?;
        assert_eq!(1, transport.send()?);
        assert!(transport.latency().is_some());
        Ok(())
    }

    #[test]
    fn test_send_to_failure_is_transport_error() -> anyhow::Result<()> {
        let _m = MTX.lock();
        let ctx = MockSocket::new_icmp_socket_ipv4_context();
        ctx.expect().times(1).returning(|_| {
            let mut mocket = MockSocket::new();
            mocket.expect_set_ttl().returning(|_| Ok(()));
            mocket.expect_send_to().times(1).returning(|_, addr| {
                Err(IoError::SendTo(
                    io::Error::from(io::ErrorKind::PermissionDenied),
                    addr,
                ))
            });
            Ok(mocket)
        });
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Ipv4))?;
        transport.add_host("192.0.2.1")?;
        let err = transport.send().unwrap_err();
        assert!(matches!(err, Error::Transport(ref msg) if msg.contains("192.0.2.1")));
        Ok(())
    }

    #[test_case(ErrorKind::HostUnreachable; "host unreachable")]
    #[test_case(ErrorKind::NetUnreachable; "net unreachable")]
    fn test_send_to_unreachable_is_lost_echo(kind: ErrorKind) -> anyhow::Result<()> {
        let _m = MTX.lock();
        let errno = io::Error::from(kind).raw_os_error();
        let ctx = MockSocket::new_icmp_socket_ipv4_context();
        ctx.expect().times(1).returning(move |_| {
            let mut mocket = MockSocket::new();
            mocket.expect_set_ttl().returning(|_| Ok(()));
            mocket.expect_send_to().times(2).returning(move |_, addr| {
                let err = errno.map_or_else(
                    || io::Error::from(io::ErrorKind::Other),
                    io::Error::from_raw_os_error,
                );
                Err(IoError::SendTo(err, addr))
            });
            mocket.expect_is_readable().never();
            mocket.expect_recv_from().never();
            Ok(mocket)
        });
        let mut transport = transport();
        transport.configure(&config(AddressFamily::Ipv4))?;
        transport.add_host("192.0.2.1")?;
        assert_eq!(0, transport.send()?);
        assert_eq!(None, transport.latency());
        assert_eq!(0, transport.send()?);
        Ok(())
    }
}
