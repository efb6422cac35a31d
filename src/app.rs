//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::{DnsClient, GaugeSink},
    directory::ResolverDirectory,
    dns::{HickoryDnsClient, Prober},
    internal_metrics::{MetricState, MetricsBuilder},
    poller::Poller,
    task_manager::TaskManager,
};
use anyhow::Result;
use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Turns an OS signal into the shutdown broadcast.
///
/// If the signal cannot be listened for, the sender is kept alive forever so
/// receivers never mistake its drop for a shutdown request.
pub async fn forward_shutdown_signal<F>(signal: F, shutdown_tx: watch::Sender<bool>)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown signal received. Shutting down gracefully...");
            let _ = shutdown_tx.send(true);
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// A handle to the running application, containing all its task handles.
pub struct App {
    task_manager: TaskManager,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// Address the scrape endpoint is bound to, if it was started.
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        shutdown_rx.changed().await.ok();
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// This pattern allows for a clean separation of concerns between constructing
/// the application's components and running the application. It also provides
/// a convenient way to override components for testing purposes.
pub struct AppBuilder {
    config: Config,
    dns_client_override: Option<Arc<dyn DnsClient>>,
    gauge_sink_override: Option<Arc<dyn GaugeSink>>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            dns_client_override: None,
            gauge_sink_override: None,
        }
    }

    /// Overrides the DNS client for testing.
    pub fn dns_client_override(mut self, client: Arc<dyn DnsClient>) -> Self {
        self.dns_client_override = Some(client);
        self
    }

    /// Overrides the gauge store for testing. No scrape endpoint is started.
    pub fn gauge_sink_override(mut self, sink: Arc<dyn GaugeSink>) -> Self {
        self.gauge_sink_override = Some(sink);
        self
    }

    /// Builds and initializes all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Resolver Directory
        // =========================================================================
        let directory = Arc::new(ResolverDirectory::from_config(&config));
        if directory.is_empty() {
            warn!("No domains configured under 'resolve'; sweeps will be empty.");
        }
        for entry in directory.entries() {
            info!(
                domain = %entry.domain,
                nameservers = ?entry.nameservers,
                query_type = %entry.query_type,
                "Configured lookup"
            );
        }

        // =========================================================================
        // 2. Metric State and Scrape Endpoint
        // =========================================================================
        let (sink, metrics_addr): (Arc<dyn GaugeSink>, Option<SocketAddr>) =
            match self.gauge_sink_override {
                Some(sink) => (sink, None),
                None => {
                    let (sink, server, addr) = MetricsBuilder::new(config.exporter.clone())
                        .build(task_manager.get_shutdown_rx())
                        .await?;
                    info!("Starting HTTP server on: {}", addr);
                    task_manager.spawn("MetricsServer", server.run());
                    let sink: Arc<dyn GaugeSink> = Arc::new(sink);
                    (sink, Some(addr))
                }
            };
        let state = MetricState::new(sink, config.exporter.namespace.clone());

        // =========================================================================
        // 3. Probe Executor and Poll Loop
        // =========================================================================
        let client = self
            .dns_client_override
            .unwrap_or_else(|| Arc::new(HickoryDnsClient::new()));
        let prober = Prober::new(client, Duration::from_millis(config.poll.timeout_ms));
        info!(
            timeout_ms = prober.timeout().as_millis() as u64,
            concurrency = config.poll.concurrency,
            "Probe executor ready"
        );
        let poller = Poller::new(directory, prober, state, &config.poll);
        task_manager.spawn("PollLoop", poller.run(task_manager.get_shutdown_rx()));

        info!("DNS exporter initialized successfully.");

        Ok(App {
            task_manager,
            metrics_addr,
        })
    }
}
