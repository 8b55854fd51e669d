use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use nettools::cli::{Args, Command};
use nettools::config::Config;
use nettools::export::{Transcript, export_json, export_trace_csv};
use nettools::lookup::DnsLookup;
use nettools::ping::{BatchResults, Diagnostics, PingEngine};
use nettools::prefs::Prefs;
use nettools::probe::{EchoTransport, RawSocketTransport, SequenceCounter, check_permissions};
use nettools::state::PingStatistics;
use nettools::trace::TracerouteEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Check permissions early
    if let Err(e) = check_permissions() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let config = Config::from_args(&args, &Prefs::load());
    let transport: Arc<dyn EchoTransport> = Arc::new(RawSocketTransport::new(SequenceCounter::new()));

    // Cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        cancel_clone.cancel();
    });

    match &args.command {
        Command::Ping { target, count, interval } => {
            let interval = match interval {
                Some(secs) => Duration::try_from_secs_f64(*secs).context("Invalid interval")?,
                None => config.interval,
            };
            let engine = PingEngine::new(config, transport).with_cancel(cancel);
            let (stats, transcript) = engine
                .ping(target, *count, interval)
                .await
                .with_context(|| format!("Ping to {} failed", target))?;

            if args.json {
                export_json(&stats, std::io::stdout())?;
            } else {
                print_transcript(&transcript)?;
            }
        }
        Command::Trace { target, max_hops, csv } => {
            let max_hops = max_hops.unwrap_or(config.max_hops);
            let mut engine = TracerouteEngine::new(config.clone(), transport).with_cancel(cancel);
            if config.dns_enabled {
                engine = engine.with_dns(Arc::new(DnsLookup::new()));
            }
            let (result, transcript) = engine
                .traceroute(target, max_hops)
                .await
                .with_context(|| format!("Traceroute to {} failed", target))?;

            if args.json {
                export_json(&result, std::io::stdout())?;
            } else if *csv {
                export_trace_csv(&result, std::io::stdout())?;
            } else {
                print_transcript(&transcript)?;
            }
        }
        Command::Batch { targets, count } => {
            let diagnostics = Diagnostics::new(config, transport).with_cancel(cancel);
            let results = diagnostics.batch_ping(targets, *count).await;
            print_batch(&results, args.json)?;
        }
        Command::Latency { targets } => {
            let diagnostics = Diagnostics::new(config, transport).with_cancel(cancel);
            let ranked = diagnostics.latency_map(targets).await;

            if args.json {
                export_json(&ranked, std::io::stdout())?;
            } else {
                let mut out = std::io::stdout().lock();
                if ranked.is_empty() {
                    writeln!(out, "No target replied.")?;
                }
                for (rank, (address, avg)) in ranked.iter().enumerate() {
                    writeln!(out, "{:2}. {:<30} {:.2} ms", rank + 1, address, avg)?;
                }
            }
        }
        Command::Connectivity { targets } => {
            let diagnostics = Diagnostics::new(config, transport).with_cancel(cancel);
            let reachability = diagnostics.connectivity_test(Some(targets.as_slice())).await;

            if args.json {
                export_json(&reachability, std::io::stdout())?;
            } else {
                let mut out = std::io::stdout().lock();
                for (address, reachable) in &reachability {
                    let label = if *reachable { "reachable" } else { "unreachable" };
                    writeln!(out, "{:<30} {}", address, label)?;
                }
            }
        }
    }

    Ok(())
}

fn print_transcript(transcript: &Transcript) -> Result<()> {
    let mut out = std::io::stdout().lock();
    write!(out, "{}", transcript)?;
    out.flush()?;
    Ok(())
}

/// Batch outcome for one address, with the error flattened to text
#[derive(Serialize)]
struct BatchEntry<'a> {
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a PingStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_batch(results: &BatchResults, json: bool) -> Result<()> {
    let entries: Vec<BatchEntry> = results
        .iter()
        .map(|(address, outcome)| BatchEntry {
            address,
            stats: outcome.as_ref().ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
        })
        .collect();

    if json {
        return export_json(&entries, std::io::stdout());
    }

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{:<30} {:>5} {:>5} {:>7} {:>9} {:>9} {:>9}",
        "Target", "Sent", "Recv", "Loss%", "Min", "Avg", "Max"
    )?;
    for entry in &entries {
        match (entry.stats, &entry.error) {
            (Some(stats), _) => {
                let ms = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
                writeln!(
                    out,
                    "{:<30} {:>5} {:>5} {:>6.1}% {:>9} {:>9} {:>9}",
                    entry.address,
                    stats.sent,
                    stats.received,
                    stats.loss_pct,
                    ms(stats.rtt_min),
                    ms(stats.rtt_avg),
                    ms(stats.rtt_max)
                )?;
            }
            (None, error) => {
                writeln!(
                    out,
                    "{:<30} error: {}",
                    entry.address,
                    error.as_deref().unwrap_or("unknown")
                )?;
            }
        }
    }
    Ok(())
}
