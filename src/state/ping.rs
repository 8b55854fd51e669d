use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latency statistics for one ping run against one target.
///
/// RTT fields are `None` until at least one reply arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingStatistics {
    pub target: String,
    pub sent: u32,
    pub received: u32,
    pub loss_pct: f64,
    pub rtt_min: Option<f64>,
    pub rtt_max: Option<f64>,
    pub rtt_avg: Option<f64>,
    /// Successful RTT samples in milliseconds, in probe order
    pub samples: Vec<f64>,
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    rtt_sum: f64,
}

impl PingStatistics {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            sent: 0,
            received: 0,
            loss_pct: 0.0,
            rtt_min: None,
            rtt_max: None,
            rtt_avg: None,
            samples: Vec::new(),
            started_at: Utc::now(),
            rtt_sum: 0.0,
        }
    }

    /// Count one probe as sent
    pub fn record_sent(&mut self) {
        self.sent += 1;
        self.refresh();
    }

    /// Record a reply with its round-trip time
    pub fn record_reply(&mut self, rtt_ms: f64) {
        self.received += 1;
        self.samples.push(rtt_ms);
        self.rtt_sum += rtt_ms;
        self.rtt_min = Some(self.rtt_min.map_or(rtt_ms, |min| min.min(rtt_ms)));
        self.rtt_max = Some(self.rtt_max.map_or(rtt_ms, |max| max.max(rtt_ms)));
        self.refresh();
    }

    /// Number of probes without a reply
    pub fn lost(&self) -> u32 {
        self.sent.saturating_sub(self.received)
    }

    /// True when at least one reply arrived
    pub fn has_data(&self) -> bool {
        self.received > 0
    }

    fn refresh(&mut self) {
        self.loss_pct = if self.sent == 0 {
            0.0
        } else {
            (1.0 - (self.received as f64 / self.sent as f64)) * 100.0
        };
        self.rtt_avg = if self.received > 0 {
            Some(self.rtt_sum / self.received as f64)
        } else {
            None
        };
    }
}
