use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ProbeError;
use crate::export::{Transcript, report};
use crate::lookup::{DnsLookup, resolve_ipv4};
use crate::probe::{EchoProbeResult, EchoTransport};
use crate::state::{HopStatus, PROBES_PER_HOP, TraceOutcome, TraceResult, TracerouteHop};

type ProbeHandle = JoinHandle<Result<EchoProbeResult, ProbeError>>;

/// Hop-by-hop path discovery with three concurrent probes per TTL
#[derive(Clone)]
pub struct TracerouteEngine {
    config: Config,
    transport: Arc<dyn EchoTransport>,
    dns: Option<Arc<DnsLookup>>,
    cancel: CancellationToken,
}

impl TracerouteEngine {
    pub fn new(config: Config, transport: Arc<dyn EchoTransport>) -> Self {
        Self {
            config,
            transport,
            dns: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Resolve hop hostnames through `dns` (only when `dns_enabled` is set)
    pub fn with_dns(mut self, dns: Arc<DnsLookup>) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Probe TTL 1..=`max_hops` until the destination answers.
    ///
    /// Stops early after consecutive silent hops. Only `PermissionDenied`
    /// is returned as an error.
    pub async fn traceroute(
        &self,
        address: &str,
        max_hops: u8,
    ) -> Result<(TraceResult, Transcript), ProbeError> {
        let mut transcript = Transcript::new();

        let destination = match resolve_ipv4(address).await {
            Ok(ip) => Some(ip),
            Err(e) => {
                warn!(address, error = %e, "trace destination did not resolve");
                transcript.push(format!("Unable to resolve target system name {}.", address));
                None
            }
        };

        let mut result = TraceResult::new(address, destination, max_hops);
        transcript.push(report::trace_header(address, max_hops));
        transcript.push(String::new());

        for ttl in 1..=max_hops {
            let hop = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    result.outcome = TraceOutcome::Cancelled;
                    break;
                }
                hop = self.probe_hop(address, ttl) => hop?,
            };

            transcript.push(report::trace_hop(&hop));
            let reached = result.is_destination(&hop);
            result.hops.push(hop);

            if reached {
                result.outcome = TraceOutcome::Reached;
                break;
            }
            if result.trailing_silence() {
                result.outcome = TraceOutcome::Unresponsive;
                break;
            }
        }

        info!(
            address,
            hops = result.hops.len(),
            outcome = ?result.outcome,
            "trace finished"
        );
        transcript.push(String::new());
        transcript.push(report::trace_footer(result.outcome));
        Ok((result, transcript))
    }

    /// Send three concurrent probes at `ttl` and merge them into one hop.
    ///
    /// The address comes from the first probe, in launch order, that got a
    /// reply. A hop with no reply is `Error` if any probe failed outright and
    /// `Timeout` otherwise.
    pub async fn probe_hop(&self, address: &str, ttl: u8) -> Result<TracerouteHop, ProbeError> {
        let handles: Vec<ProbeHandle> = (0..PROBES_PER_HOP)
            .map(|_| {
                let transport = Arc::clone(&self.transport);
                let address = address.to_string();
                let timeout = self.config.timeout;
                tokio::spawn(async move { transport.echo(&address, ttl, timeout).await })
            })
            .collect();

        // Abort in-flight probes if this future is dropped (cancellation)
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let _abort_guard = scopeguard::guard(aborts, |aborts| {
            for handle in aborts {
                handle.abort();
            }
        });

        let mut hop = TracerouteHop::silent(ttl);
        let mut errored = false;

        for (slot, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(Ok(probe)) if probe.success => {
                    if hop.ip.is_none() {
                        hop.ip = probe.source;
                    }
                    hop.rtts[slot] = Some(probe.rtt_ms);
                }
                Ok(Ok(probe)) => {
                    debug!(address, ttl, slot, failure = ?probe.failure, "hop probe got no reply");
                }
                Ok(Err(e)) if e.is_permission_denied() => return Err(e),
                Ok(Err(e)) => {
                    warn!(address, ttl, slot, error = %e, "hop probe failed");
                    errored = true;
                }
                Err(e) => {
                    warn!(address, ttl, slot, error = %e, "hop probe task failed");
                    errored = true;
                }
            }
        }

        hop.status = if hop.replies() > 0 {
            HopStatus::Success
        } else if errored {
            HopStatus::Error
        } else {
            HopStatus::Timeout
        };

        if self.config.dns_enabled
            && let (Some(dns), Some(ip)) = (&self.dns, hop.ip)
        {
            hop.hostname = dns.reverse_lookup(ip).await;
        }

        Ok(hop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::{ScriptedTransport, reply, timeout};
    use async_trait::async_trait;
    use std::io;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn engine(transport: Arc<ScriptedTransport>) -> TracerouteEngine {
        TracerouteEngine::new(Config::default(), transport)
    }

    #[tokio::test]
    async fn test_trace_reaches_destination() {
        let transport = ScriptedTransport::new(|_, ttl, _| reply(Ipv4Addr::new(10, 0, 0, ttl), 1.0 + ttl as f64));
        let (result, transcript) = engine(transport.clone())
            .traceroute("10.0.0.5", 30)
            .await
            .unwrap();

        assert!(result.complete());
        assert_eq!(result.outcome, TraceOutcome::Reached);
        assert_eq!(result.hops.len(), 5);
        for (i, hop) in result.hops.iter().enumerate() {
            assert_eq!(hop.hop as usize, i + 1);
            assert_eq!(hop.status, HopStatus::Success);
        }
        assert_eq!(result.hops[4].ip, Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(transport.calls(), 15);
        assert_eq!(transcript.lines().last().unwrap(), "Trace complete.");
    }

    #[tokio::test]
    async fn test_trace_aborts_after_silent_hops() {
        let transport = ScriptedTransport::new(|_, _, _| timeout());
        let (result, transcript) = engine(transport).traceroute("192.0.2.1", 30).await.unwrap();

        assert_eq!(result.outcome, TraceOutcome::Unresponsive);
        assert!(!result.complete());
        assert_eq!(result.hops.len(), 3);
        assert!(result.hops.iter().all(|h| h.ip.is_none() && h.is_timeout()));
        assert!(transcript.lines().iter().any(|l| l.ends_with("Request timed out.")));
    }

    #[tokio::test]
    async fn test_trace_silence_must_be_consecutive() {
        // Hops 1-2 and 4-5 silent, hop 3 answers, hop 6 is the destination
        let transport = ScriptedTransport::new(|_, ttl, _| match ttl {
            3 => reply(Ipv4Addr::new(10, 0, 0, 3), 3.0),
            6 => reply(Ipv4Addr::new(192, 0, 2, 6), 6.0),
            _ => timeout(),
        });
        let (result, _) = engine(transport).traceroute("192.0.2.6", 30).await.unwrap();

        assert_eq!(result.outcome, TraceOutcome::Reached);
        assert_eq!(result.hops.len(), 6);
    }

    #[tokio::test]
    async fn test_trace_max_hops_exceeded() {
        let transport = ScriptedTransport::new(|_, ttl, _| reply(Ipv4Addr::new(10, 0, 1, ttl), 2.0));
        let (result, transcript) = engine(transport).traceroute("192.0.2.99", 4).await.unwrap();

        assert_eq!(result.outcome, TraceOutcome::MaxHopsExceeded);
        assert_eq!(result.hops.len(), 4);
        assert_eq!(
            transcript.lines().last().unwrap(),
            "Trace incomplete: maximum hops reached"
        );
    }

    #[tokio::test]
    async fn test_hop_survives_probe_error_and_panic() {
        let transport = ScriptedTransport::new(|_, _, call| match call {
            0 => Err(ProbeError::Io(io::Error::other("socket exhausted"))),
            1 => panic!("probe task died"),
            _ => reply(Ipv4Addr::new(10, 9, 9, 9), 7.5),
        });
        let hop = engine(transport).probe_hop("192.0.2.1", 1).await.unwrap();

        assert_eq!(hop.status, HopStatus::Success);
        assert_eq!(hop.ip, Some(Ipv4Addr::new(10, 9, 9, 9)));
        assert_eq!(hop.replies(), 1);
        assert_eq!(hop.rtts.iter().flatten().copied().collect::<Vec<_>>(), [7.5]);
    }

    /// First call answers late, every later call answers at once
    struct SlowFirstTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EchoTransport for SlowFirstTransport {
        async fn echo(&self, _host: &str, _ttl: u8, _timeout: Duration) -> Result<EchoProbeResult, ProbeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            reply(Ipv4Addr::new(10, 0, 0, call as u8 + 1), 1.0 + call as f64)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hop_ip_follows_launch_order() {
        let transport = Arc::new(SlowFirstTransport {
            calls: AtomicUsize::new(0),
        });
        let hop = TracerouteEngine::new(Config::default(), transport)
            .probe_hop("192.0.2.1", 1)
            .await
            .unwrap();

        // Slot 0 finished last but still names the hop
        assert_eq!(hop.ip, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(hop.rtts, [Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(hop.status, HopStatus::Success);
    }

    #[tokio::test]
    async fn test_hop_error_status() {
        let transport = ScriptedTransport::new(|_, _, call| match call {
            0 => Err(ProbeError::Io(io::Error::other("socket exhausted"))),
            _ => timeout(),
        });
        let hop = engine(transport).probe_hop("192.0.2.1", 2).await.unwrap();

        assert_eq!(hop.status, HopStatus::Error);
        assert_eq!(hop.ip, None);
        assert_eq!(hop.hostname, None);
    }

    #[tokio::test]
    async fn test_hop_permission_denied_propagates() {
        let transport = ScriptedTransport::new(|_, _, _| {
            Err(ProbeError::PermissionDenied(io::Error::from(io::ErrorKind::PermissionDenied)))
        });
        let err = engine(transport).traceroute("192.0.2.1", 30).await.unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[tokio::test]
    async fn test_trace_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let transport = ScriptedTransport::new(|_, _, _| timeout());
        let (result, transcript) = engine(transport.clone())
            .with_cancel(cancel)
            .traceroute("192.0.2.1", 30)
            .await
            .unwrap();

        assert_eq!(result.outcome, TraceOutcome::Cancelled);
        assert!(result.hops.is_empty());
        assert_eq!(transport.calls(), 0);
        assert_eq!(transcript.lines().last().unwrap(), "Trace cancelled");
    }
}
