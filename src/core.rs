//! Core domain types and service traits for the DNS exporter
//!
//! This module defines the data that flows between the probe executor, the
//! poll loop and the metric store, together with the trait contracts at the
//! seams where those components meet the outside world (the DNS wire and the
//! metrics backend).

use crate::dns::DnsError;
use async_trait::async_trait;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The address record type a domain is probed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    #[default]
    A,
    Aaaa,
}

impl QueryType {
    pub fn record_type(self) -> RecordType {
        match self {
            QueryType::A => RecordType::A,
            QueryType::Aaaa => RecordType::AAAA,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.record_type())
    }
}

/// Coarse classification of an answer record relative to the query that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A record of the queried address type.
    Address,
    /// A CNAME record.
    Alias,
    Other,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Address, RecordKind::Alias, RecordKind::Other];

    /// Classifies an observed answer type against the type that was queried.
    pub fn classify(observed: RecordType, queried: QueryType) -> Self {
        if observed == queried.record_type() {
            RecordKind::Address
        } else if observed == RecordType::CNAME {
            RecordKind::Alias
        } else {
            RecordKind::Other
        }
    }

    /// The `record_type` label value exported for this kind.
    pub fn label(self, queried: QueryType) -> String {
        match self {
            RecordKind::Address => queried.to_string(),
            RecordKind::Alias => RecordType::CNAME.to_string(),
            RecordKind::Other => "OTHER".to_string(),
        }
    }
}

/// Number of answers seen per record kind in a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnswerCounts {
    address: u32,
    alias: u32,
    other: u32,
}

impl AnswerCounts {
    pub fn tally<I>(answers: I, queried: QueryType) -> Self
    where
        I: IntoIterator<Item = RecordType>,
    {
        let mut counts = Self::default();
        for observed in answers {
            counts.record(RecordKind::classify(observed, queried));
        }
        counts
    }

    pub fn record(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Address => self.address += 1,
            RecordKind::Alias => self.alias += 1,
            RecordKind::Other => self.other += 1,
        }
    }

    pub fn get(&self, kind: RecordKind) -> u32 {
        match kind {
            RecordKind::Address => self.address,
            RecordKind::Alias => self.alias,
            RecordKind::Other => self.other,
        }
    }

    pub fn total(&self) -> u32 {
        self.address + self.alias + self.other
    }
}

/// The raw outcome of one query/response exchange with a nameserver.
#[derive(Debug, Clone, PartialEq)]
pub struct DnsExchange {
    /// Record types of the answer section, in wire order.
    pub answers: Vec<RecordType>,
    pub response_code: ResponseCode,
    /// Latency between sending the query and receiving the matching response.
    pub rtt: Duration,
}

/// The classified outcome of a probe that received a response.
///
/// Probes that never got a response are reported as a [`DnsError`] instead,
/// so a `ProbeResult` always has `responded == true`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub responded: bool,
    /// True iff at least one answer has the queried record type.
    pub success: bool,
    pub answers: AnswerCounts,
    pub rtt: Duration,
    pub response_code: ResponseCode,
}

impl ProbeResult {
    pub fn from_exchange(exchange: DnsExchange, queried: QueryType) -> Self {
        let answers = AnswerCounts::tally(exchange.answers, queried);
        Self {
            responded: true,
            success: answers.get(RecordKind::Address) > 0,
            answers,
            rtt: exchange.rtt,
            response_code: exchange.response_code,
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Performs a single DNS exchange against a specific nameserver.
#[async_trait]
pub trait DnsClient: Send + Sync {
    /// Sends one query for `domain`/`record_type` to `nameserver` and waits
    /// for the matching response.
    ///
    /// # Arguments
    /// * `nameserver` - `host:port` of the server to ask
    /// * `domain` - The name to query
    /// * `record_type` - The queried record type
    ///
    /// # Returns
    /// * `Ok(DnsExchange)` for any response, including empty and negative ones
    /// * `Err` if no usable response was received
    async fn exchange(
        &self,
        nameserver: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<DnsExchange, DnsError>;
}

/// Write-only access to a store of gauges.
///
/// Every call replaces the previous value for the same name and label set.
pub trait GaugeSink: Send + Sync {
    fn set_gauge(&self, name: &str, labels: &[(&'static str, String)], value: f64);
}
