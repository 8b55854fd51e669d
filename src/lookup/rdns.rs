use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tracing::debug;

use super::sanitize_display;

/// DNS cache entry
struct CacheEntry {
    hostname: Option<String>,
    cached_at: Instant,
}

/// Reverse DNS lookup with caching
pub struct DnsLookup {
    resolver: TokioAsyncResolver,
    cache: RwLock<HashMap<Ipv4Addr, CacheEntry>>,
    cache_ttl: Duration,
}

impl DnsLookup {
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

        Self {
            resolver,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::from_secs(3600), // 1 hour
        }
    }

    /// Lookup reverse DNS for an IP, using cache.
    ///
    /// Failures and names that merely echo the address yield `None`.
    pub async fn reverse_lookup(&self, ip: Ipv4Addr) -> Option<String> {
        if let Some(hit) = self.cached(ip) {
            return hit;
        }

        let hostname = match self.resolver.reverse_lookup(IpAddr::V4(ip)).await {
            Ok(lookup) => lookup.iter().next().map(|name| {
                let s = name.to_string();
                // Remove trailing dot
                sanitize_display(s.trim_end_matches('.'))
            }),
            Err(e) => {
                debug!(%ip, error = %e, "reverse lookup failed");
                None
            }
        };
        let hostname = hostname.filter(|name| !name.is_empty() && *name != ip.to_string());

        self.store(ip, hostname.clone());
        hostname
    }

    /// Fresh cache entry for `ip`, if any. `Some(None)` is a cached miss.
    fn cached(&self, ip: Ipv4Addr) -> Option<Option<String>> {
        let cache = self.cache.read();
        cache
            .get(&ip)
            .filter(|entry| entry.cached_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.hostname.clone())
    }

    /// Insert an entry, evicting expired ones first
    fn store(&self, ip: Ipv4Addr, hostname: Option<String>) {
        let mut cache = self.cache.write();
        cache.retain(|_, entry| entry.cached_at.elapsed() < self.cache_ttl);
        cache.insert(
            ip,
            CacheEntry {
                hostname,
                cached_at: Instant::now(),
            },
        );
    }
}

impl Default for DnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cached_entry_short_circuits_lookup() {
        let dns = DnsLookup::new();
        let ip = Ipv4Addr::new(192, 0, 2, 1);
        dns.store(ip, Some("edge.example.net".to_string()));

        assert_eq!(dns.reverse_lookup(ip).await, Some("edge.example.net".to_string()));
    }

    #[tokio::test]
    async fn test_cached_miss_is_remembered() {
        let dns = DnsLookup::new();
        let ip = Ipv4Addr::new(192, 0, 2, 2);
        dns.store(ip, None);

        assert_eq!(dns.cached(ip), Some(None));
        assert_eq!(dns.reverse_lookup(ip).await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_ignored() {
        let mut dns = DnsLookup::new();
        dns.cache_ttl = Duration::ZERO;
        let ip = Ipv4Addr::new(192, 0, 2, 3);
        dns.store(ip, Some("stale.example.net".to_string()));

        assert_eq!(dns.cached(ip), None);
    }

    #[tokio::test]
    async fn test_store_evicts_expired_entries() {
        let mut dns = DnsLookup::new();
        dns.cache_ttl = Duration::ZERO;
        dns.store(Ipv4Addr::new(192, 0, 2, 4), None);
        dns.store(Ipv4Addr::new(192, 0, 2, 5), None);

        let cache = dns.cache.read();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key(&Ipv4Addr::new(192, 0, 2, 5)));
    }
}
