use clap::{Parser, Subcommand};
use std::time::Duration;

/// ICMP ping and traceroute diagnostics over raw sockets
#[derive(Parser, Debug, Clone)]
#[command(name = "nettools")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Per-probe timeout in milliseconds
    #[arg(long = "timeout", global = true)]
    pub timeout_ms: Option<u64>,

    /// TTL for ping probes
    #[arg(long = "ttl", global = true)]
    pub ttl: Option<u8>,

    /// Skip reverse DNS lookups
    #[arg(long = "no-dns", global = true)]
    pub no_dns: bool,

    /// Output JSON instead of a console transcript
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Measure latency to one target
    Ping {
        /// Target host (IPv4 address or hostname)
        target: String,

        /// Number of probes to send
        #[arg(short = 'c', long = "count", default_value = "4")]
        count: u32,

        /// Seconds between probes
        #[arg(short = 'i', long = "interval")]
        interval: Option<f64>,
    },

    /// Discover the path to a target hop by hop
    Trace {
        /// Target host (IPv4 address or hostname)
        target: String,

        /// Maximum hops to probe
        #[arg(short = 'm', long = "max-hops")]
        max_hops: Option<u8>,

        /// Output CSV
        #[arg(long = "csv")]
        csv: bool,
    },

    /// Ping several targets concurrently
    Batch {
        #[arg(required = true)]
        targets: Vec<String>,

        /// Probes per target
        #[arg(short = 'c', long = "count", default_value = "2")]
        count: u32,
    },

    /// Rank targets by average latency
    Latency {
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Check reachability of well-known anchors (or the given targets)
    Connectivity { targets: Vec<String> },
}

impl Args {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == Some(0) {
            return Err("Timeout must be positive".into());
        }

        if self.ttl == Some(0) {
            return Err("TTL must be at least 1".into());
        }

        match &self.command {
            Command::Ping { count, interval, .. } => {
                if *count == 0 {
                    return Err("Count must be at least 1".into());
                }
                if let Some(interval) = interval
                    && Duration::try_from_secs_f64(*interval).is_err()
                {
                    return Err("Interval must be a non-negative number of seconds".into());
                }
            }
            Command::Trace { max_hops, csv, .. } => {
                if *max_hops == Some(0) {
                    return Err("Max hops must be at least 1".into());
                }
                if *csv && self.json {
                    return Err("Cannot combine --csv and --json".into());
                }
            }
            Command::Batch { count, .. } => {
                if *count == 0 {
                    return Err("Count must be at least 1".into());
                }
            }
            Command::Latency { .. } | Command::Connectivity { .. } => {}
        }

        Ok(())
    }

    /// Log filter directive implied by `-v`
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv.iter().copied()).unwrap()
    }

    #[test]
    fn test_parse_ping_defaults() {
        let args = parse(&["nettools", "ping", "example.com"]);
        match args.command {
            Command::Ping { ref target, count, interval } => {
                assert_eq!(target, "example.com");
                assert_eq!(count, 4);
                assert_eq!(interval, None);
            }
            _ => panic!("expected ping"),
        }
        assert!(args.validate().is_ok());
        assert_eq!(args.log_level(), "warn");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["nettools", "trace", "10.0.0.1", "-m", "12", "--timeout", "750", "-vv"]);
        assert_eq!(args.timeout_duration(), Some(Duration::from_millis(750)));
        assert_eq!(args.log_level(), "trace");
        assert!(matches!(args.command, Command::Trace { max_hops: Some(12), .. }));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(parse(&["nettools", "ping", "a", "-c", "0"]).validate().is_err());
        assert!(parse(&["nettools", "trace", "a", "-m", "0"]).validate().is_err());
        assert!(parse(&["nettools", "--timeout", "0", "ping", "a"]).validate().is_err());
        assert!(parse(&["nettools", "--ttl", "0", "ping", "a"]).validate().is_err());
        assert!(parse(&["nettools", "batch", "a", "b", "-c", "0"]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_interval() {
        assert!(parse(&["nettools", "ping", "a", "--interval=-1"]).validate().is_err());
        assert!(parse(&["nettools", "ping", "a", "-i", "0"]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_interval() {
        assert!(parse(&["nettools", "ping", "a", "-i", "1e20"]).validate().is_err());
        assert!(parse(&["nettools", "ping", "a", "-i", "inf"]).validate().is_err());
        assert!(parse(&["nettools", "ping", "a", "-i", "0.25"]).validate().is_ok());
    }

    #[test]
    fn test_validate_csv_json_conflict() {
        let args = parse(&["nettools", "--json", "trace", "a", "--csv"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_batch_requires_targets() {
        assert!(Args::try_parse_from(["nettools", "batch"]).is_err());
        let args = parse(&["nettools", "connectivity"]);
        assert!(matches!(args.command, Command::Connectivity { ref targets } if targets.is_empty()));
    }
}
