//! dns-exporter - DNS nameserver probe exporter
//!
//! Periodically probes configured domains against configured nameservers and
//! serves the results as Prometheus metrics.

use anyhow::Result;
use clap::Parser;
use dns_exporter::{
    app::{forward_shutdown_signal, App},
    cli::Cli,
    config::Config,
};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load_from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            // Logging is not configured yet, so initialize a default subscriber for this error.
            tracing_subscriber::fmt().init();
            error!("Unable to parse config file: {:#}", err);
            std::process::exit(1);
        }
    };

    // Initialize logging. RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("DNS exporter starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.exporter.listen_address);
    info!("Metric Namespace: {}", config.exporter.namespace);
    info!("Poll Interval: {}s", config.poll.interval_seconds);
    info!("Query Timeout: {}ms", config.poll.timeout_ms);
    info!("Probe Concurrency: {}", config.poll.concurrency);
    info!("Unresponsive Policy: {:?}", config.poll.unresponsive_policy);
    info!(
        "Default Nameserver: {}",
        config.default_ns.as_deref().unwrap_or("(fallback)")
    );
    info!("Domains: {}", config.resolve.len());
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(forward_shutdown_signal(tokio::signal::ctrl_c(), shutdown_tx));

    app.run().await
}
