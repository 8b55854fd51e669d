//! User preferences persistence.
//!
//! Optional defaults read from ~/.config/nettools/config.toml. Command-line
//! flags take precedence over anything set here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::config::Config;

/// User preferences
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    /// Per-probe timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Seconds between ping probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hops: Option<u8>,
    /// Reverse DNS for traceroute hops
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<bool>,
    /// Connectivity test targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchors: Option<Vec<String>>,
}

impl Prefs {
    /// Get config file path: ~/.config/nettools/config.toml
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nettools").join("config.toml"))
    }

    /// Load preferences from disk (returns default if missing/invalid)
    pub fn load() -> Self {
        let Some(contents) = Self::path().and_then(|p| fs::read_to_string(p).ok()) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring invalid preferences file");
            Self::default()
        })
    }


    /// Overwrite config values that are set here. Zero or nonsensical values
    /// are skipped.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ms) = self.timeout_ms.filter(|&ms| ms > 0) {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(interval) = self
            .interval_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        {
            config.interval = interval;
        }
        if let Some(ttl) = self.ttl.filter(|&ttl| ttl > 0) {
            config.ttl = ttl;
        }
        if let Some(max_hops) = self.max_hops.filter(|&hops| hops > 0) {
            config.max_hops = max_hops;
        }
        if let Some(dns) = self.dns {
            config.dns_enabled = dns;
        }
        if let Some(anchors) = self.anchors.as_ref().filter(|a| !a.is_empty()) {
            config.anchors = anchors.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefs_default() {
        let prefs = Prefs::default();
        assert!(prefs.timeout_ms.is_none());
        assert!(prefs.anchors.is_none());

        let mut config = Config::default();
        prefs.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_prefs_serialization() {
        let prefs = Prefs {
            timeout_ms: Some(1500),
            max_hops: Some(20),
            anchors: Some(vec!["9.9.9.9".to_string()]),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&prefs).unwrap();
        assert!(toml_str.contains("timeout_ms = 1500"));
        assert!(toml_str.contains("max_hops = 20"));
        // Unset fields are omitted
        assert!(!toml_str.contains("ttl"));

        let loaded: Prefs = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded, prefs);
    }

    #[test]
    fn test_prefs_apply() {
        let prefs: Prefs = toml::from_str(
            r#"
            timeout_ms = 1200
            interval_secs = 0.5
            max_hops = 15
            dns = false
            anchors = ["9.9.9.9", "1.0.0.1"]
        "#,
        )
        .unwrap();

        let mut config = Config::default();
        prefs.apply(&mut config);
        assert_eq!(config.timeout, Duration::from_millis(1200));
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.max_hops, 15);
        assert_eq!(config.ttl, 64);
        assert!(!config.dns_enabled);
        assert_eq!(config.anchors, vec!["9.9.9.9", "1.0.0.1"]);
    }

    #[test]
    fn test_prefs_ignores_invalid_values() {
        let prefs = Prefs {
            timeout_ms: Some(0),
            interval_secs: Some(-2.0),
            ttl: Some(0),
            anchors: Some(Vec::new()),
            ..Default::default()
        };
        let mut config = Config::default();
        prefs.apply(&mut config);
        assert_eq!(config, Config::default());
    }
}
