//! Single-probe echo client and the transport seam the engines run on.
//!
//! Every probe owns its socket for its whole lifetime. A `RawEchoClient` is
//! opened per probe and the socket closes when the client drops, whether the
//! probe replied, timed out, failed, or its future was cancelled.
//!
//! Replies are not matched against the request: the first datagram to arrive
//! on the probe's own socket within the timeout is taken as the answer. This
//! only holds because sockets are never shared between overlapping probes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::error::ProbeError;
use crate::lookup::resolve_ipv4;
use crate::probe::{build_echo_request, create_raw_icmp_socket, get_identifier, icmp_offset, into_async};

/// Receive buffer size for a single reply
const RECV_BUFFER_SIZE: usize = 1024;

/// Why a probe produced no reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeFailure {
    /// Nothing arrived before the timeout
    Timeout,
    /// The target name did not resolve to an IPv4 address
    Unresolved,
    /// Socket option, send or receive failed
    Transport,
}

/// Outcome of one echo request
#[derive(Debug, Clone, PartialEq)]
pub struct EchoProbeResult {
    /// Source address of the reply
    pub source: Option<Ipv4Addr>,
    pub success: bool,
    pub rtt_ms: f64,
    /// ICMP bytes of the reply with the IP header stripped
    pub reply: Option<Vec<u8>>,
    pub failure: Option<ProbeFailure>,
}

impl EchoProbeResult {
    pub fn replied(source: Ipv4Addr, rtt_ms: f64, reply: Vec<u8>) -> Self {
        Self {
            source: Some(source),
            success: true,
            rtt_ms,
            reply: Some(reply),
            failure: None,
        }
    }

    pub fn failed(failure: ProbeFailure) -> Self {
        Self {
            source: None,
            success: false,
            rtt_ms: 0.0,
            reply: None,
            failure: Some(failure),
        }
    }

    pub fn timed_out() -> Self {
        Self::failed(ProbeFailure::Timeout)
    }

    /// Length of the reply payload in bytes
    pub fn reply_len(&self) -> usize {
        self.reply.as_ref().map_or(0, Vec::len)
    }
}

/// Sequence numbers shared by every client a caller creates.
///
/// Cloning shares the underlying counter. Increments are atomic, so every
/// value handed out is unique until the counter wraps after 65536 probes.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter(Arc<AtomicU16>);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting after `value` (the next call returns `value + 1`)
    pub fn starting_at(value: u16) -> Self {
        Self(Arc::new(AtomicU16::new(value)))
    }

    /// Increment and return the new sequence number (wraps at u16::MAX)
    pub fn next(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

/// One raw ICMP socket, used for a single echo exchange
pub struct RawEchoClient {
    socket: UdpSocket,
    identifier: u16,
    sequence: SequenceCounter,
}

impl RawEchoClient {
    /// Open a raw socket. Fails with `PermissionDenied` without privilege.
    pub fn open(identifier: u16, sequence: SequenceCounter) -> Result<Self, ProbeError> {
        let socket = into_async(create_raw_icmp_socket()?)?;
        Ok(Self {
            socket,
            identifier,
            sequence,
        })
    }

    /// Send one echo request to `host` and wait for any reply.
    ///
    /// Never fails: resolution, socket and timeout problems all come back as
    /// an unsuccessful `EchoProbeResult`.
    pub async fn send_echo_request(&self, host: &str, ttl: u8, timeout: Duration) -> EchoProbeResult {
        let target = match resolve_ipv4(host).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!(host, error = %e, "probe target did not resolve");
                return EchoProbeResult::failed(ProbeFailure::Unresolved);
            }
        };

        match self.exchange(target, ttl, timeout).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                trace!(%target, ttl, "probe timed out");
                EchoProbeResult::timed_out()
            }
            Err(e) => {
                debug!(%target, ttl, error = %e, "probe transport error");
                EchoProbeResult::failed(ProbeFailure::Transport)
            }
        }
    }

    async fn exchange(
        &self,
        target: Ipv4Addr,
        ttl: u8,
        timeout: Duration,
    ) -> std::io::Result<Option<EchoProbeResult>> {
        self.socket.set_ttl(ttl as u32)?;

        let sequence = self.sequence.next();
        let packet = build_echo_request(self.identifier, sequence, None);

        let sent_at = Instant::now();
        self.socket
            .send_to(&packet, SocketAddr::new(IpAddr::V4(target), 0))
            .await?;
        trace!(%target, ttl, sequence, "echo request sent");

        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let (len, from) = match tokio::time::timeout(timeout, self.socket.recv_from(&mut buffer)).await {
            Ok(received) => received?,
            Err(_) => return Ok(None),
        };
        let rtt_ms = sent_at.elapsed().as_secs_f64() * 1000.0;

        let datagram = &buffer[..len];
        let offset = icmp_offset(datagram).min(len);
        let source = match from.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => source_from_header(datagram).unwrap_or(Ipv4Addr::UNSPECIFIED),
        };

        Ok(Some(EchoProbeResult::replied(source, rtt_ms, datagram[offset..].to_vec())))
    }
}

/// Source address field of an IPv4 header
fn source_from_header(datagram: &[u8]) -> Option<Ipv4Addr> {
    let bytes: [u8; 4] = datagram.get(12..16)?.try_into().ok()?;
    Some(Ipv4Addr::from(bytes))
}

/// Runs one scoped echo probe.
///
/// `Err` is reserved for failing to acquire the probe's resources (socket
/// creation); everything after acquisition is reported in the result.
#[async_trait]
pub trait EchoTransport: Send + Sync {
    async fn echo(&self, host: &str, ttl: u8, timeout: Duration) -> Result<EchoProbeResult, ProbeError>;
}

/// Production transport: a fresh raw socket per probe
#[derive(Debug, Clone)]
pub struct RawSocketTransport {
    identifier: u16,
    sequence: SequenceCounter,
}

impl RawSocketTransport {
    pub fn new(sequence: SequenceCounter) -> Self {
        Self {
            identifier: get_identifier(),
            sequence,
        }
    }
}

impl Default for RawSocketTransport {
    fn default() -> Self {
        Self::new(SequenceCounter::new())
    }
}

#[async_trait]
impl EchoTransport for RawSocketTransport {
    async fn echo(&self, host: &str, ttl: u8, timeout: Duration) -> Result<EchoProbeResult, ProbeError> {
        let client = RawEchoClient::open(self.identifier, self.sequence.clone())?;
        Ok(client.send_echo_request(host, ttl, timeout).await)
    }
}
