//! Multi-target diagnostics built on the ping engine.
//!
//! Each target runs in its own task with its own probes, so a failure or a
//! panic while pinging one address never affects the others.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ProbeError;
use crate::ping::PingEngine;
use crate::probe::EchoTransport;
use crate::state::PingStatistics;

pub type BatchResults = BTreeMap<String, Result<PingStatistics, ProbeError>>;

pub struct Diagnostics {
    engine: PingEngine,
}

impl Diagnostics {
    pub fn new(config: Config, transport: Arc<dyn EchoTransport>) -> Self {
        Self {
            engine: PingEngine::new(config, transport),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.engine = self.engine.with_cancel(cancel);
        self
    }

    pub fn config(&self) -> &Config {
        self.engine.config()
    }

    /// Ping every address concurrently, `count` probes each.
    ///
    /// Duplicate addresses are pinged once.
    pub async fn batch_ping(&self, addresses: &[String], count: u32) -> BatchResults {
        let mut unique: Vec<String> = addresses.to_vec();
        unique.sort();
        unique.dedup();

        let interval = self.engine.config().interval;
        let handles: Vec<_> = unique
            .iter()
            .map(|address| {
                let engine = self.engine.clone();
                let address = address.clone();
                tokio::spawn(async move {
                    engine
                        .ping(&address, count, interval)
                        .await
                        .map(|(stats, _)| stats)
                })
            })
            .collect();

        let mut results = BTreeMap::new();
        for (address, joined) in unique.into_iter().zip(join_all(handles).await) {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(%address, error = %e, "ping task failed");
                    Err(ProbeError::Task(e.to_string()))
                }
            };
            if let Err(ref e) = outcome {
                debug!(%address, error = %e, "batch ping error");
            }
            results.insert(address, outcome);
        }
        results
    }

    /// Reachable addresses ranked by average RTT, fastest first
    pub async fn latency_map(&self, addresses: &[String]) -> Vec<(String, f64)> {
        let samples = self.engine.config().latency_samples;
        let mut ranked: Vec<(String, f64)> = self
            .batch_ping(addresses, samples)
            .await
            .into_iter()
            .filter_map(|(address, outcome)| {
                let avg = outcome.ok()?.rtt_avg?;
                Some((address, avg))
            })
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked
    }

    /// One probe per address; reachable iff it answered.
    ///
    /// With no addresses the configured anchors are used.
    pub async fn connectivity_test(&self, addresses: Option<&[String]>) -> BTreeMap<String, bool> {
        let targets = match addresses {
            Some(addresses) if !addresses.is_empty() => addresses.to_vec(),
            _ => self.engine.config().anchors.clone(),
        };

        self.batch_ping(&targets, 1)
            .await
            .into_iter()
            .map(|(address, outcome)| {
                let reachable = outcome.map(|stats| stats.has_data()).unwrap_or(false);
                (address, reachable)
            })
            .collect()
    }
}
