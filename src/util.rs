//! Socket helpers.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Receive buffer requested for client sockets. A GETBULK reply with many
/// repetitions can approach the UDP payload limit.
pub(crate) const RECV_BUFFER_SIZE: usize = 256 * 1024;

/// Bind an ephemeral UDP socket in the address family of `target`.
///
/// IPv6 sockets are IPv6-only so that a v4 target never gets routed
/// through a mapped address by accident.
pub(crate) fn bind_ephemeral_udp_socket(
    target: SocketAddr,
    recv_buffer_size: Option<usize>,
) -> io::Result<UdpSocket> {
    let (domain, local): (Domain, SocketAddr) = if target.is_ipv6() {
        (Domain::IPV6, (Ipv6Addr::UNSPECIFIED, 0).into())
    } else {
        (Domain::IPV4, (Ipv4Addr::UNSPECIFIED, 0).into())
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if target.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    if let Some(size) = recv_buffer_size {
        // capped by net.core.rmem_max
        let _ = socket.set_recv_buffer_size(size);
    }
    socket.set_nonblocking(true)?;
    socket.bind(&local.into())?;

    UdpSocket::from_std(socket.into())
}

/// Resolve `host[:port]`, defaulting the port.
///
/// Bare IPv6 literals are accepted with or without brackets.
pub(crate) fn resolve_target(target: &str, default_port: u16) -> io::Result<SocketAddr> {
    use std::net::ToSocketAddrs;

    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = target.trim_matches(['[', ']']).parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    let with_port = if target.rsplit_once(':').is_some_and(|(_, p)| p.parse::<u16>().is_ok()) {
        target.to_owned()
    } else {
        format!("{}:{}", target, default_port)
    };
    with_port.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {}", target),
        )
    })
}
