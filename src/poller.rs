//! The poll loop: periodic sweeps over the resolver directory.
//!
//! Each sweep probes every (domain, nameserver) pair once and writes the
//! outcome to the metric state. Between sweeps the loop sleeps for the
//! configured interval, measured from the end of the previous sweep.

use crate::{
    config::{PollConfig, UnresponsivePolicy},
    core::ProbeResult,
    directory::{ResolverDirectory, ResolverEntry},
    dns::{DnsError, Prober},
    internal_metrics::MetricState,
};
use futures::{stream::FuturesUnordered, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, info, warn};

/// What a single pair contributed to a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    /// The nameserver answered with at least one record of the queried type.
    Succeeded,
    /// The nameserver answered without a usable record.
    Empty,
    /// No response: timeout, transport error or unresolvable address.
    Unresponsive,
    /// The probe could not be evaluated and nothing was recorded.
    Skipped,
}

/// Totals for one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSummary {
    pub probes: usize,
    pub responded: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

impl SweepSummary {
    fn add(mut self, outcome: PairOutcome) -> Self {
        self.probes += 1;
        match outcome {
            PairOutcome::Succeeded => {
                self.responded += 1;
                self.succeeded += 1;
            }
            PairOutcome::Empty => self.responded += 1,
            PairOutcome::Unresponsive => {}
            PairOutcome::Skipped => self.skipped += 1,
        }
        self
    }
}

/// Drives sweeps of the directory through the prober on a fixed interval.
#[derive(Debug)]
pub struct Poller {
    directory: Arc<ResolverDirectory>,
    prober: Prober,
    state: MetricState,
    interval: Duration,
    concurrency: usize,
    policy: UnresponsivePolicy,
}

impl Poller {
    pub fn new(
        directory: Arc<ResolverDirectory>,
        prober: Prober,
        state: MetricState,
        config: &PollConfig,
    ) -> Self {
        Self {
            directory,
            prober,
            state,
            interval: Duration::from_secs(config.interval_seconds),
            concurrency: config.concurrency.max(1),
            policy: config.unresponsive_policy,
        }
    }

    /// Runs sweeps until the shutdown signal fires.
    ///
    /// The first sweep starts immediately. A sweep in progress when the
    /// signal arrives runs to completion, and no further sweep is started.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            domains = self.directory.len(),
            probes_per_sweep = self.directory.pair_count(),
            interval_seconds = self.interval.as_secs(),
            "Beginning iteration over domain lookups"
        );
        loop {
            let summary = self.sweep().await;
            debug!(?summary, "Sweep complete, idling");

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Poll loop received shutdown signal.");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Poll loop finished.");
    }

    /// Probes every pair once and records the results.
    pub async fn sweep(&self) -> SweepSummary {
        let start = Instant::now();
        let mut pending = self.directory.pairs();
        let mut in_flight = FuturesUnordered::new();
        for (nameserver, entry) in pending.by_ref().take(self.concurrency) {
            in_flight.push(self.probe_pair(nameserver, entry));
        }

        let mut summary = SweepSummary::default();
        while let Some(outcome) = in_flight.next().await {
            summary = summary.add(outcome);
            if let Some((nameserver, entry)) = pending.next() {
                in_flight.push(self.probe_pair(nameserver, entry));
            }
        }

        let elapsed = start.elapsed();
        self.state
            .set_sweep_completed(elapsed, chrono::Utc::now().timestamp());
        info!(
            probes = summary.probes,
            responded = summary.responded,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            duration_ms = elapsed.as_millis() as u64,
            "Sweep finished"
        );
        summary
    }

    async fn probe_pair(&self, nameserver: &str, entry: &ResolverEntry) -> PairOutcome {
        let outcome = self
            .prober
            .probe(nameserver, &entry.domain, entry.query_type)
            .await;
        self.record(nameserver, entry, outcome)
    }

    /// Applies one probe outcome to the metric state.
    pub fn record(
        &self,
        nameserver: &str,
        entry: &ResolverEntry,
        outcome: Result<ProbeResult, DnsError>,
    ) -> PairOutcome {
        let domain = entry.domain.as_str();
        match outcome {
            Ok(result) => {
                self.state.set_resolver_responded(nameserver, true);
                self.state.set_resolver_rtt(nameserver, result.rtt);
                self.state.set_lookup_num_answers(
                    nameserver,
                    domain,
                    entry.query_type,
                    &result.answers,
                );
                self.state
                    .set_lookup_success(nameserver, domain, result.success);

                if result.success {
                    debug!(domain, nameserver, rtt_s = result.rtt.as_secs_f64(), "Lookup successful");
                    PairOutcome::Succeeded
                } else {
                    info!(
                        domain,
                        nameserver,
                        rcode = %result.response_code,
                        "Lookup returned no {} records",
                        entry.query_type
                    );
                    PairOutcome::Empty
                }
            }
            Err(e) if e.is_unresponsive() => {
                warn!(domain, nameserver, error = %e, "Lookup error");
                self.state.set_resolver_responded(nameserver, false);
                if self.policy == UnresponsivePolicy::Fail {
                    self.state.set_lookup_success(nameserver, domain, false);
                }
                PairOutcome::Unresponsive
            }
            Err(e) => {
                warn!(domain, nameserver, error = %e, "Skipping lookup");
                PairOutcome::Skipped
            }
        }
    }
}
