use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Probes sent per hop
pub const PROBES_PER_HOP: usize = 3;

/// Consecutive fully-timed-out hops that abort a trace
pub const MAX_SILENT_HOPS: usize = 3;

/// Outcome of the probes at one TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopStatus {
    /// At least one probe got a reply
    Success,
    /// Every probe timed out
    Timeout,
    /// No reply, and at least one probe failed outright
    Error,
}

/// A single hop (TTL level) in the path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerouteHop {
    /// 1-based hop number (the TTL used)
    pub hop: u8,
    /// Responding address; `None` is shown as `*`
    pub ip: Option<Ipv4Addr>,
    pub hostname: Option<String>,
    /// Per-probe RTT in milliseconds, in launch order
    pub rtts: [Option<f64>; PROBES_PER_HOP],
    pub status: HopStatus,
}

impl TracerouteHop {
    /// Hop where nothing answered
    pub fn silent(hop: u8) -> Self {
        Self {
            hop,
            ip: None,
            hostname: None,
            rtts: [None; PROBES_PER_HOP],
            status: HopStatus::Timeout,
        }
    }

    /// Address for display, `*` when unknown
    pub fn ip_label(&self) -> String {
        self.ip.map_or_else(|| "*".to_string(), |ip| ip.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        self.status == HopStatus::Timeout
    }

    /// Number of probes that got a reply
    pub fn replies(&self) -> usize {
        self.rtts.iter().flatten().count()
    }
}

/// Why a trace stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceOutcome {
    /// The destination itself answered
    Reached,
    /// Several consecutive hops were silent; the path is likely filtered
    Unresponsive,
    /// Ran out of hops before reaching the destination
    MaxHopsExceeded,
    /// Stopped by the caller
    Cancelled,
}

/// Ordered hop list for one traceroute run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub target: String,
    /// Destination address the trace compares hops against
    pub destination: Option<Ipv4Addr>,
    pub max_hops: u8,
    pub hops: Vec<TracerouteHop>,
    pub outcome: TraceOutcome,
    pub started_at: DateTime<Utc>,
}

impl TraceResult {
    pub fn new(target: impl Into<String>, destination: Option<Ipv4Addr>, max_hops: u8) -> Self {
        Self {
            target: target.into(),
            destination,
            max_hops,
            hops: Vec::with_capacity(max_hops as usize),
            outcome: TraceOutcome::MaxHopsExceeded,
            started_at: Utc::now(),
        }
    }

    /// True only when the destination was reached
    pub fn complete(&self) -> bool {
        self.outcome == TraceOutcome::Reached
    }

    /// Whether `hop` is a reply from the destination
    pub fn is_destination(&self, hop: &TracerouteHop) -> bool {
        hop.status == HopStatus::Success && hop.ip.is_some() && hop.ip == self.destination
    }

    /// True when the last `MAX_SILENT_HOPS` hops all timed out
    pub fn trailing_silence(&self) -> bool {
        self.hops.len() >= MAX_SILENT_HOPS
            && self.hops[self.hops.len() - MAX_SILENT_HOPS..]
                .iter()
                .all(TracerouteHop::is_timeout)
    }
}
