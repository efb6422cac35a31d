use crate::{
    core::{DnsClient, DnsExchange},
    dns::DnsError,
};
use async_trait::async_trait;
use hickory_resolver::proto::{op::ResponseCode, rr::RecordType};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type PairKey = (String, String);

enum FakeResponse {
    Reply(Result<DnsExchange, DnsError>),
    Hang,
}

/// Fake DNS client for testing.
///
/// Responses are queued per (nameserver, domain) pair. When a pair's queue is
/// down to its last response, that response is repeated for every further
/// call, so a single `add_*` call covers any number of sweeps.
#[derive(Clone, Default)]
pub struct FakeDnsClient {
    responses: Arc<Mutex<HashMap<PairKey, VecDeque<FakeResponse>>>>,
    call_count: Arc<Mutex<HashMap<PairKey, u32>>>,
    last_record_type: Arc<Mutex<HashMap<PairKey, RecordType>>>,
}

fn key(nameserver: &str, domain: &str) -> PairKey {
    (nameserver.to_string(), domain.to_string())
}

impl FakeDnsClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, nameserver: &str, domain: &str, response: FakeResponse) {
        self.responses
            .lock()
            .unwrap()
            .entry(key(nameserver, domain))
            .or_default()
            .push_back(response);
    }

    /// Queue a NOERROR response with the given answer types.
    pub fn add_answers(&self, nameserver: &str, domain: &str, answers: Vec<RecordType>, rtt: Duration) {
        self.add_response(nameserver, domain, answers, ResponseCode::NoError, rtt);
    }

    /// Queue a response with an explicit response code.
    pub fn add_response(
        &self,
        nameserver: &str,
        domain: &str,
        answers: Vec<RecordType>,
        response_code: ResponseCode,
        rtt: Duration,
    ) {
        let exchange = DnsExchange {
            answers,
            response_code,
            rtt,
        };
        self.push(nameserver, domain, FakeResponse::Reply(Ok(exchange)));
    }

    /// Queue an error for a pair.
    pub fn add_error(&self, nameserver: &str, domain: &str, error: DnsError) {
        self.push(nameserver, domain, FakeResponse::Reply(Err(error)));
    }

    /// Queue a response that never arrives.
    pub fn add_hang(&self, nameserver: &str, domain: &str) {
        self.push(nameserver, domain, FakeResponse::Hang);
    }

    /// Get the number of times a pair was queried
    pub fn get_call_count(&self, nameserver: &str, domain: &str) -> u32 {
        self.call_count
            .lock()
            .unwrap()
            .get(&key(nameserver, domain))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.call_count.lock().unwrap().values().sum()
    }

    pub fn last_record_type(&self, nameserver: &str, domain: &str) -> Option<RecordType> {
        self.last_record_type
            .lock()
            .unwrap()
            .get(&key(nameserver, domain))
            .copied()
    }
}

#[async_trait]
impl DnsClient for FakeDnsClient {
    async fn exchange(
        &self,
        nameserver: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<DnsExchange, DnsError> {
        let pair = key(nameserver, domain);
        *self.call_count.lock().unwrap().entry(pair.clone()).or_insert(0) += 1;
        self.last_record_type
            .lock()
            .unwrap()
            .insert(pair.clone(), record_type);

        let next = {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(&pair) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().map(|r| match r {
                    FakeResponse::Reply(reply) => FakeResponse::Reply(reply.clone()),
                    FakeResponse::Hang => FakeResponse::Hang,
                }),
                None => None,
            }
        };

        match next {
            Some(FakeResponse::Reply(reply)) => reply,
            Some(FakeResponse::Hang) => std::future::pending().await,
            None => Err(DnsError::Transport(format!(
                "no responses configured for {} at {}",
                domain, nameserver
            ))),
        }
    }
}
