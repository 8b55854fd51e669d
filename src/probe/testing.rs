//! Scripted transport for engine tests.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::ProbeError;
use crate::probe::{EchoProbeResult, EchoTransport};

type Script = dyn Fn(&str, u8, usize) -> Result<EchoProbeResult, ProbeError> + Send + Sync;

/// Answers each probe by calling a closure with (host, ttl, call index)
pub(crate) struct ScriptedTransport {
    script: Box<Script>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&str, u8, usize) -> Result<EchoProbeResult, ProbeError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EchoTransport for ScriptedTransport {
    async fn echo(&self, host: &str, ttl: u8, _timeout: Duration) -> Result<EchoProbeResult, ProbeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(host, ttl, call)
    }
}

pub(crate) fn reply(from: Ipv4Addr, rtt_ms: f64) -> Result<EchoProbeResult, ProbeError> {
    Ok(EchoProbeResult::replied(from, rtt_ms, vec![0; 48]))
}

pub(crate) fn timeout() -> Result<EchoProbeResult, ProbeError> {
    Ok(EchoProbeResult::timed_out())
}
