use std::io;
use thiserror::Error;

use crate::probe::MessageType;

/// Reasons an ICMP message fails to decode or validate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("ICMP packet too short: {0} bytes (need at least 8)")]
    TooShort(usize),

    #[error("code {code} is not valid for ICMP type {kind}")]
    UnsupportedCode { kind: MessageType, code: u8 },

    #[error("checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { stored: u16, computed: u16 },
}

/// Errors surfaced by the probe layer and the engines built on it.
///
/// Only `PermissionDenied` escapes `PingEngine` and `TracerouteEngine`;
/// everything else is absorbed at the probe boundary.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to resolve {host}: {reason}")]
    Resolution { host: String, reason: String },

    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] PacketError),

    #[error(
        "insufficient permissions for raw ICMP sockets ({0}).\n\n\
         Fix options:\n\
         \u{2022} Run with sudo\n\
         \u{2022} Add capability: sudo setcap cap_net_raw+ep <binary>"
    )]
    PermissionDenied(#[source] io::Error),

    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("probe task failed: {0}")]
    Task(String),
}

impl ProbeError {
    /// True for the one condition that must propagate out of the engines
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Classify a socket creation failure
    pub(crate) fn from_socket_error(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(err),
            _ => Self::Io(err),
        }
    }
}
