//! Console transcript lines in the style of the classic ping/tracert tools.

use crate::probe::EchoProbeResult;
use crate::state::{HopStatus, PingStatistics, TraceOutcome, TracerouteHop};

pub fn ping_header(target: &str, count: u32) -> String {
    format!("Pinging {} with {} packets:", target, count)
}

pub fn ping_reply(target: &str, result: &EchoProbeResult, ttl: u8) -> String {
    let from = result.source.map_or_else(|| target.to_string(), |ip| ip.to_string());
    format!(
        "Reply from {}: bytes={} time={:.2}ms TTL={}",
        from,
        result.reply_len(),
        result.rtt_ms,
        ttl
    )
}

pub fn ping_timeout() -> String {
    "Request timed out.".to_string()
}

pub fn ping_error(error: &dyn std::fmt::Display) -> String {
    format!("Ping error: {}", error)
}

/// Statistics block printed after the last probe
pub fn ping_summary(stats: &PingStatistics) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!("Ping statistics for {}:", stats.target),
        format!(
            "    Packets: Sent = {}, Received = {}, Lost = {} ({:.1}% loss)",
            stats.sent,
            stats.received,
            stats.lost(),
            stats.loss_pct
        ),
    ];

    if let (Some(min), Some(max), Some(avg)) = (stats.rtt_min, stats.rtt_max, stats.rtt_avg) {
        lines.push("Approximate round trip times in milli-seconds:".to_string());
        lines.push(format!(
            "    Minimum = {:.2}ms, Maximum = {:.2}ms, Average = {:.2}ms",
            min, max, avg
        ));
    }
    lines
}

pub fn trace_header(target: &str, max_hops: u8) -> String {
    format!("Tracing route to {} over a maximum of {} hops:", target, max_hops)
}

pub fn trace_hop(hop: &TracerouteHop) -> String {
    let mut line = format!("{:2} ", hop.hop);
    match hop.status {
        HopStatus::Success => {
            for rtt in &hop.rtts {
                match rtt {
                    Some(ms) => line.push_str(&format!("{:4.2} ms ", ms)),
                    None => line.push_str(&format!("{:8} ", "*")),
                }
            }
            line.push_str(&hop.ip_label());
            if let Some(ref hostname) = hop.hostname {
                line.push_str(&format!(" [{}]", hostname));
            }
        }
        HopStatus::Timeout => {
            line.push_str(&format!("{:8} {:8} {:8} Request timed out.", "*", "*", "*"));
        }
        HopStatus::Error => {
            line.push_str(&format!("{:8} {:8} {:8} Error occurred.", "*", "*", "*"));
        }
    }
    line
}

pub fn trace_footer(outcome: TraceOutcome) -> String {
    match outcome {
        TraceOutcome::Reached => "Trace complete.",
        TraceOutcome::Unresponsive => "Trace terminated: multiple consecutive timeouts",
        TraceOutcome::MaxHopsExceeded => "Trace incomplete: maximum hops reached",
        TraceOutcome::Cancelled => "Trace cancelled",
    }
    .to_string()
}
