use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::cli::Args;
use crate::prefs::Prefs;

/// Public resolvers probed by the connectivity test when no targets are given
pub const DEFAULT_ANCHORS: [&str; 3] = [
    "8.8.8.8",        // Google DNS
    "1.1.1.1",        // Cloudflare DNS
    "208.67.222.222", // OpenDNS
];

/// Runtime configuration shared by the engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Per-probe timeout
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Pause between sequential ping probes
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    /// TTL for ping probes
    pub ttl: u8,
    /// Maximum hops for traceroute
    pub max_hops: u8,
    /// Probes per target for latency ranking
    pub latency_samples: u32,
    /// Enable reverse DNS lookups for traceroute hops
    pub dns_enabled: bool,
    /// Default targets for the connectivity test
    pub anchors: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            ttl: 64,
            max_hops: 30,
            latency_samples: 3,
            dns_enabled: true,
            anchors: DEFAULT_ANCHORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Layer saved preferences, then CLI flags, over the defaults
    pub fn from_args(args: &Args, prefs: &Prefs) -> Self {
        let mut config = Self::default();
        prefs.apply(&mut config);

        if let Some(timeout) = args.timeout_duration() {
            config.timeout = timeout;
        }
        if let Some(ttl) = args.ttl {
            config.ttl = ttl;
        }
        if args.no_dns {
            config.dns_enabled = false;
        }
        config
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
