use std::net::{IpAddr, Ipv4Addr};

use crate::error::ProbeError;

/// Resolve a hostname or literal to its first IPv4 address
pub async fn resolve_ipv4(host: &str) -> Result<Ipv4Addr, ProbeError> {
    // Literal addresses skip the resolver
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(_) => Err(resolution_error(host, "IPv6 targets are not supported")),
        };
    }

    let addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| resolution_error(host, e))?;

    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| resolution_error(host, "no IPv4 addresses found"))
}

fn resolution_error(host: &str, reason: impl ToString) -> ProbeError {
    ProbeError::Resolution {
        host: host.to_string(),
        reason: reason.to_string(),
    }
}
