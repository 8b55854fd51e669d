use anyhow::Result;
use std::io::Write;

use crate::state::{HopStatus, TraceResult};

/// Export a traceroute to CSV format
pub fn export_trace_csv<W: Write>(result: &TraceResult, mut writer: W) -> Result<()> {
    // Write header
    writeln!(writer, "hop,ip,hostname,rtt1_ms,rtt2_ms,rtt3_ms,status")?;

    for hop in &result.hops {
        let rtts: Vec<String> = hop
            .rtts
            .iter()
            .map(|rtt| rtt.map(|ms| format!("{:.2}", ms)).unwrap_or_default())
            .collect();
        let status = match hop.status {
            HopStatus::Success => "success",
            HopStatus::Timeout => "timeout",
            HopStatus::Error => "error",
        };

        writeln!(
            writer,
            "{},{},{},{},{}",
            hop.hop,
            hop.ip_label(),
            escape_csv(hop.hostname.as_deref().unwrap_or("")),
            rtts.join(","),
            status
        )?;
    }

    Ok(())
}

/// Quote a field if it contains separators or quotes
fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TracerouteHop;
    use std::net::Ipv4Addr;

    #[test]
    fn test_export_trace_csv() {
        let mut result = TraceResult::new("example", Some(Ipv4Addr::new(10, 0, 0, 2)), 30);
        result.hops.push(TracerouteHop {
            hop: 1,
            ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
            hostname: Some("gw.lan".to_string()),
            rtts: [Some(1.0), Some(1.25), None],
            status: HopStatus::Success,
        });
        result.hops.push(TracerouteHop::silent(2));

        let mut buf = Vec::new();
        export_trace_csv(&result, &mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "hop,ip,hostname,rtt1_ms,rtt2_ms,rtt3_ms,status");
        assert_eq!(lines[1], "1,10.0.0.1,gw.lan,1.00,1.25,,success");
        assert_eq!(lines[2], "2,*,,,,,timeout");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
