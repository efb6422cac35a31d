//! The probe executor: one query against one nameserver, classified.

use crate::{
    core::{DnsClient, ProbeResult, QueryType},
    dns::DnsError,
};
use std::{sync::Arc, time::Duration};
use tracing::{instrument, trace};

/// Runs single probes through a [`DnsClient`] with a hard per-query timeout.
#[derive(Clone)]
pub struct Prober {
    client: Arc<dyn DnsClient>,
    timeout: Duration,
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Prober {
    pub fn new(client: Arc<dyn DnsClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Queries `domain` at `nameserver` once.
    ///
    /// # Returns
    /// * `Ok(ProbeResult)` whenever the nameserver answered, even with no records
    /// * `Err(DnsError)` on timeout, transport failure or an unusable response
    #[instrument(level = "trace", skip(self))]
    pub async fn probe(
        &self,
        nameserver: &str,
        domain: &str,
        query_type: QueryType,
    ) -> Result<ProbeResult, DnsError> {
        let exchange = tokio::time::timeout(
            self.timeout,
            self.client.exchange(nameserver, domain, query_type.record_type()),
        )
        .await
        .map_err(|_| DnsError::Timeout(self.timeout))??;

        let result = ProbeResult::from_exchange(exchange, query_type);
        trace!(
            nameserver,
            domain,
            success = result.success,
            answers = result.answers.total(),
            "Probe classified"
        );
        Ok(result)
    }
}
