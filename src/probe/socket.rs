use socket2::{Domain, Protocol, Socket, Type};
use std::net::UdpSocket as StdUdpSocket;
use tokio::net::UdpSocket;

use crate::error::ProbeError;

/// Minimum IPv4 header length (no options)
pub const IPV4_HEADER_SIZE: usize = 20;

/// Check that raw ICMP sockets can be created.
///
/// Raw sockets need root or CAP_NET_RAW on Linux and root on macOS. Missing
/// privilege is a startup misconfiguration, so callers check once up front.
pub fn check_permissions() -> Result<(), ProbeError> {
    create_raw_icmp_socket().map(drop)
}

/// Create a non-blocking raw IPv4 ICMP socket
pub fn create_raw_icmp_socket() -> Result<Socket, ProbeError> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
        .map_err(ProbeError::from_socket_error)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Register a raw socket with the tokio reactor.
///
/// A raw ICMP socket behaves like a datagram socket for `send_to` and
/// `recv_from`, so tokio's UDP wrapper drives it without extra plumbing.
/// Must be called from within a runtime.
pub fn into_async(socket: Socket) -> Result<UdpSocket, ProbeError> {
    let std_socket: StdUdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

/// Offset of the ICMP message inside a datagram read from a raw socket.
///
/// Uses the IHL field when it describes a sane IPv4 header and falls back to
/// the fixed 20-byte header otherwise.
pub fn icmp_offset(datagram: &[u8]) -> usize {
    match datagram.first() {
        Some(&first) if first >> 4 == 4 => {
            let ihl = ((first & 0x0F) as usize) * 4;
            if ihl >= IPV4_HEADER_SIZE && ihl <= datagram.len() {
                ihl
            } else {
                IPV4_HEADER_SIZE
            }
        }
        _ => IPV4_HEADER_SIZE,
    }
}
