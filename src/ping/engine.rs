use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ProbeError;
use crate::export::{Transcript, report};
use crate::probe::{EchoTransport, ProbeFailure};
use crate::state::PingStatistics;

/// Sequential latency measurement against one target
#[derive(Clone)]
pub struct PingEngine {
    config: Config,
    transport: Arc<dyn EchoTransport>,
    cancel: CancellationToken,
}

impl PingEngine {
    pub fn new(config: Config, transport: Arc<dyn EchoTransport>) -> Self {
        Self {
            config,
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop runs early when `cancel` fires
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send `count` probes one after another, pausing `interval` between them.
    ///
    /// Every probe gets its own socket. Timeouts and per-probe failures are
    /// counted as loss; only `PermissionDenied` aborts the run. A probe that
    /// is in flight when the run is cancelled is not counted.
    pub async fn ping(
        &self,
        address: &str,
        count: u32,
        interval: Duration,
    ) -> Result<(PingStatistics, Transcript), ProbeError> {
        let mut stats = PingStatistics::new(address);
        let mut transcript = Transcript::new();
        transcript.push(report::ping_header(address, count));

        for i in 0..count {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    transcript.push("Ping cancelled.");
                    break;
                }
                outcome = self.transport.echo(address, self.config.ttl, self.config.timeout) => outcome,
            };
            stats.record_sent();

            match outcome {
                Ok(result) if result.success => {
                    debug!(address, seq = i + 1, rtt_ms = result.rtt_ms, "echo reply");
                    stats.record_reply(result.rtt_ms);
                    transcript.push(report::ping_reply(address, &result, self.config.ttl));
                }
                Ok(result) => {
                    debug!(address, seq = i + 1, failure = ?result.failure, "no reply");
                    let line = match result.failure {
                        Some(ProbeFailure::Unresolved) => {
                            report::ping_error(&format!("could not resolve {}", address))
                        }
                        Some(ProbeFailure::Transport) => report::ping_error(&"transport failure"),
                        Some(ProbeFailure::Timeout) | None => report::ping_timeout(),
                    };
                    transcript.push(line);
                }
                Err(e) if e.is_permission_denied() => return Err(e),
                Err(e) => {
                    warn!(address, error = %e, "probe failed");
                    transcript.push(report::ping_error(&e));
                }
            }

            // No pause after the last probe
            if i + 1 < count {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        transcript.push("Ping cancelled.");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        transcript.extend(report::ping_summary(&stats));
        Ok((stats, transcript))
    }
}
