use anyhow::Result;
use serde::Serialize;
use std::io::Write;

/// Export any result type as pretty-printed JSON followed by a newline
pub fn export_json<T: Serialize + ?Sized, W: Write>(value: &T, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PingStatistics, TraceOutcome, TraceResult, TracerouteHop};

    #[test]
    fn test_export_ping_json() {
        let mut stats = PingStatistics::new("localhost");
        stats.record_sent();
        stats.record_reply(2.0);

        let mut buf = Vec::new();
        export_json(&stats, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["target"], "localhost");
        assert_eq!(value["received"], 1);
        assert_eq!(value["rtt_avg"], 2.0);
        assert_eq!(value["samples"][0], 2.0);
    }

    #[test]
    fn test_export_trace_json_sentinel_as_null() {
        let mut result = TraceResult::new("example", None, 30);
        result.hops.push(TracerouteHop::silent(1));
        result.outcome = TraceOutcome::Unresponsive;

        let mut buf = Vec::new();
        export_json(&result, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert!(value["hops"][0]["ip"].is_null());
        assert_eq!(value["hops"][0]["status"], "Timeout");
        assert_eq!(value["outcome"], "Unresponsive");
    }
}
