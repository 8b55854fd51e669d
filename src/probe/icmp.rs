use pnet::packet::Packet;
use pnet::packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{IcmpCode, IcmpType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::PacketError;

/// ICMP header size (fixed)
pub const ICMP_HEADER_SIZE: usize = 8;
/// Bytes of `x` padding following the timestamp in the default payload
pub const DEFAULT_PADDING_SIZE: usize = 32;
/// Default payload size (8-byte timestamp + padding)
pub const DEFAULT_PAYLOAD_SIZE: usize = 8 + DEFAULT_PADDING_SIZE;

/// Byte offset of the checksum field, as a 16-bit word index
const CHECKSUM_WORD: usize = 1;

/// Get process identifier for ICMP identification field
pub fn get_identifier() -> u16 {
    (std::process::id() & 0xFFFF) as u16
}

/// ICMP message types understood by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    EchoReply,
    DestinationUnreachable,
    SourceQuench,
    Redirect,
    EchoRequest,
    RouterAdvertisement,
    RouterSolicitation,
    TimeExceeded,
    ParameterProblem,
    TimestampRequest,
    TimestampReply,
    Unknown(u8),
}

impl MessageType {
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Self::EchoReply,
            3 => Self::DestinationUnreachable,
            4 => Self::SourceQuench,
            5 => Self::Redirect,
            8 => Self::EchoRequest,
            9 => Self::RouterAdvertisement,
            10 => Self::RouterSolicitation,
            11 => Self::TimeExceeded,
            12 => Self::ParameterProblem,
            13 => Self::TimestampRequest,
            14 => Self::TimestampReply,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Self::EchoReply => 0,
            Self::DestinationUnreachable => 3,
            Self::SourceQuench => 4,
            Self::Redirect => 5,
            Self::EchoRequest => 8,
            Self::RouterAdvertisement => 9,
            Self::RouterSolicitation => 10,
            Self::TimeExceeded => 11,
            Self::ParameterProblem => 12,
            Self::TimestampRequest => 13,
            Self::TimestampReply => 14,
            Self::Unknown(other) => other,
        }
    }

    /// Codes accepted by `validate` for this type. Types outside the table
    /// accept nothing.
    pub fn allowed_codes(self) -> &'static [u8] {
        match self {
            Self::EchoReply => &[0],
            Self::DestinationUnreachable => &[0, 1, 2, 3],
            Self::SourceQuench => &[0],
            Self::Redirect => &[0, 1, 2, 3],
            Self::EchoRequest => &[0],
            Self::TimeExceeded => &[0, 1],
            _ => &[],
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "Unknown({})", raw),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// A decoded ICMP message with an echo-style header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpMessage {
    pub kind: MessageType,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl IcmpMessage {
    /// Serialize header and payload as they currently stand
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; ICMP_HEADER_SIZE + self.payload.len()];
        write_header(&mut buffer, self.kind, self.code, self.identifier, self.sequence);
        buffer[2..4].copy_from_slice(&self.checksum.to_be_bytes());
        buffer[ICMP_HEADER_SIZE..].copy_from_slice(&self.payload);
        buffer
    }

    /// Checksum over header and payload with the checksum field treated as zero
    pub fn compute_checksum(&self) -> u16 {
        checksum(&self.to_bytes())
    }

    /// Check the type/code table and the checksum
    pub fn verify(&self) -> Result<(), PacketError> {
        if !self.kind.allowed_codes().contains(&self.code) {
            return Err(PacketError::UnsupportedCode {
                kind: self.kind,
                code: self.code,
            });
        }
        let computed = self.compute_checksum();
        if computed != self.checksum {
            return Err(PacketError::ChecksumMismatch {
                stored: self.checksum,
                computed,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> bool {
        self.verify().is_ok()
    }
}

/// Internet checksum (RFC 1071) over `data`, skipping the checksum word.
///
/// Equivalent to summing with the checksum field zeroed: 16-bit big-endian
/// words, trailing odd byte padded with zero, carries folded, complemented.
pub fn checksum(data: &[u8]) -> u16 {
    pnet::packet::util::checksum(data, CHECKSUM_WORD)
}

/// Default echo payload: f64 UNIX timestamp (big-endian) + `x` padding
pub fn default_payload() -> Vec<u8> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    let mut payload = Vec::with_capacity(DEFAULT_PAYLOAD_SIZE);
    payload.extend_from_slice(&now.to_be_bytes());
    payload.extend_from_slice(&[b'x'; DEFAULT_PADDING_SIZE]);
    payload
}

/// Build an ICMP Echo Request packet.
///
/// When `payload` is `None` the default timestamp + padding payload is used.
pub fn build_echo_request(identifier: u16, sequence: u16, payload: Option<&[u8]>) -> Vec<u8> {
    let payload = match payload {
        Some(bytes) => bytes.to_vec(),
        None => default_payload(),
    };
    let mut buffer = vec![0u8; ICMP_HEADER_SIZE + payload.len()];
    write_header(&mut buffer, MessageType::EchoRequest, 0, identifier, sequence);
    buffer[ICMP_HEADER_SIZE..].copy_from_slice(&payload);

    let cksum = checksum(&buffer);
    buffer[2..4].copy_from_slice(&cksum.to_be_bytes());
    buffer
}

/// Decode an ICMP message. The remainder after the 8-byte header is payload.
pub fn decode(bytes: &[u8]) -> Result<IcmpMessage, PacketError> {
    let packet = EchoRequestPacket::new(bytes).ok_or(PacketError::TooShort(bytes.len()))?;
    Ok(IcmpMessage {
        kind: MessageType::from_raw(packet.get_icmp_type().0),
        code: packet.get_icmp_code().0,
        checksum: packet.get_checksum(),
        identifier: packet.get_identifier(),
        sequence: packet.get_sequence_number(),
        payload: packet.payload().to_vec(),
    })
}

/// Write type/code/identifier/sequence with a zero checksum
fn write_header(buffer: &mut [u8], kind: MessageType, code: u8, identifier: u16, sequence: u16) {
    // Buffers are always sized to at least the header
    if let Some(mut packet) = MutableEchoRequestPacket::new(buffer) {
        packet.set_icmp_type(IcmpType::new(kind.raw()));
        packet.set_icmp_code(IcmpCode::new(code));
        packet.set_checksum(0);
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
    }
}
