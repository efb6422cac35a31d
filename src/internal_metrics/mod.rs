//! # Internal Metrics Module
//!
//! This module holds the metric state that the poll loop writes and the
//! scrape endpoint reads.
//!
//! ## Components:
//!
//! - **`MetricState`**: The typed facade the poll loop writes through. It owns
//!   the metric names, their label sets and the namespace prefix, and turns
//!   each operation into a single gauge write on a [`GaugeSink`].
//!
//! - **`PrometheusSink`**: The production [`GaugeSink`]. It owns a
//!   `PrometheusRecorder` directly (the recorder is never installed as the
//!   process-wide global) and hands out a `PrometheusHandle` for rendering.
//!
//! - **`MetricsBuilder`**: Binds the listener and wires a `PrometheusSink`
//!   to a `MetricsServer`.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint for Prometheus to scrape.

use crate::config::ExporterConfig;
use crate::core::{AnswerCounts, GaugeSink, QueryType, RecordKind};
use crate::internal_metrics::server::MetricsServer;
use anyhow::{Context, Result};
use metrics::{Key, KeyName, Label, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub mod server;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub const RESOLVER_RESPONDED: &str = "resolver_responded";
pub const RESOLVER_RTT: &str = "resolver_rtt";
pub const LOOKUP_SUCCESS: &str = "lookup_success";
pub const LOOKUP_NUM_ANSWERS: &str = "lookup_num_answers";
pub const SWEEP_DURATION: &str = "sweep_duration_seconds";
pub const LAST_SWEEP_TIMESTAMP: &str = "last_sweep_timestamp_seconds";

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// The typed write API over the metric store.
///
/// Label sets are fixed per metric, so cardinality is bounded by the
/// resolver directory.
#[derive(Clone)]
pub struct MetricState {
    sink: Arc<dyn GaugeSink>,
    namespace: String,
}

impl std::fmt::Debug for MetricState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricState")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl MetricState {
    pub fn new(sink: Arc<dyn GaugeSink>, namespace: impl Into<String>) -> Self {
        Self {
            sink,
            namespace: namespace.into(),
        }
    }

    /// Prepends the namespace, e.g. `resolver_rtt` becomes `dns_resolver_rtt`.
    pub fn metric_name(&self, name: &str) -> String {
        format!("{}_{}", self.namespace, name)
    }

    fn set(&self, name: &str, labels: &[(&'static str, String)], value: f64) {
        self.sink.set_gauge(&self.metric_name(name), labels, value);
    }

    pub fn set_resolver_responded(&self, nameserver: &str, responded: bool) {
        self.set(
            RESOLVER_RESPONDED,
            &[("nameserver", nameserver.to_string())],
            bool_value(responded),
        );
    }

    pub fn set_resolver_rtt(&self, nameserver: &str, rtt: Duration) {
        self.set(
            RESOLVER_RTT,
            &[("nameserver", nameserver.to_string())],
            rtt.as_secs_f64(),
        );
    }

    pub fn set_lookup_success(&self, nameserver: &str, domain: &str, success: bool) {
        self.set(
            LOOKUP_SUCCESS,
            &[
                ("nameserver", nameserver.to_string()),
                ("domain", domain.to_string()),
            ],
            bool_value(success),
        );
    }

    /// Writes one `lookup_num_answers` sample per record kind, zeros included.
    pub fn set_lookup_num_answers(
        &self,
        nameserver: &str,
        domain: &str,
        query_type: QueryType,
        answers: &AnswerCounts,
    ) {
        for kind in RecordKind::ALL {
            self.set(
                LOOKUP_NUM_ANSWERS,
                &[
                    ("nameserver", nameserver.to_string()),
                    ("domain", domain.to_string()),
                    ("record_type", kind.label(query_type)),
                ],
                f64::from(answers.get(kind)),
            );
        }
    }

    pub fn set_sweep_completed(&self, duration: Duration, unix_time: i64) {
        self.set(SWEEP_DURATION, &[], duration.as_secs_f64());
        self.set(LAST_SWEEP_TIMESTAMP, &[], unix_time as f64);
    }
}

fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// A [`GaugeSink`] backed by an explicitly owned Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusSink {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl PrometheusSink {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self {
            recorder: Arc::new(recorder),
            handle,
        }
    }

    /// Registers HELP text for every metric under `namespace`.
    pub fn describe(&self, namespace: &str) {
        let describe = |name: &str, unit: Option<Unit>, help: &'static str| {
            self.recorder.describe_gauge(
                KeyName::from(format!("{}_{}", namespace, name)),
                unit,
                SharedString::from(help),
            );
        };
        describe(RESOLVER_RESPONDED, None, "Returns 1 (True) if the DNS Resolver responded with an answer.");
        describe(RESOLVER_RTT, Some(Unit::Seconds), "The Round Trip Time in seconds for the DNS Resolver to respond.");
        describe(LOOKUP_SUCCESS, None, "Returns 1 (True) if the lookup returned at least 1 answer of the queried type.");
        describe(LOOKUP_NUM_ANSWERS, Some(Unit::Count), "The number of DNS Answers received for a given lookup.");
        describe(SWEEP_DURATION, Some(Unit::Seconds), "Wall time of the most recent sweep over all configured lookups.");
        describe(LAST_SWEEP_TIMESTAMP, Some(Unit::Seconds), "Unix time at which the most recent sweep completed.");
    }

    /// Returns a handle that renders the current state in the Prometheus text format.
    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeSink for PrometheusSink {
    fn set_gauge(&self, name: &str, labels: &[(&'static str, String)], value: f64) {
        let labels: Vec<Label> = labels
            .iter()
            .map(|(key, value)| Label::new(*key, value.clone()))
            .collect();
        let key = Key::from_parts(name.to_string(), labels);
        self.recorder.register_gauge(&key, &METADATA).set(value);
    }
}

/// Builder for the metrics system.
///
/// This builder is responsible for creating the `PrometheusSink`, binding
/// the scrape listener and constructing the `MetricsServer`.
pub struct MetricsBuilder {
    config: ExporterConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: ExporterConfig) -> Self {
        Self { config }
    }

    /// Binds the listener and returns the sink, the server and the bound address.
    ///
    /// # Arguments
    ///
    /// * `shutdown_rx` - A watch channel receiver for graceful shutdown.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(PrometheusSink, MetricsServer, SocketAddr)> {
        let sink = PrometheusSink::new();
        sink.describe(&self.config.namespace);

        let listener = TcpListener::bind(self.config.listen_address)
            .await
            .with_context(|| {
                format!(
                    "Failed to bind metrics server to {}",
                    self.config.listen_address
                )
            })?;
        let addr = listener
            .local_addr()
            .context("Failed to get local address for metrics server")?;

        let server = MetricsServer::new(listener, sink.handle(), shutdown_rx);
        Ok((sink, server, addr))
    }
}
