use crate::{
    core::{DnsClient, DnsExchange},
    dns::DnsError,
};
use async_trait::async_trait;
use hickory_resolver::proto::{
    op::{Message, MessageType, OpCode, Query},
    rr::{Name, RecordType},
};
use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
    time::Instant,
};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Large enough for any UDP response, with or without EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Sends single queries over UDP, building and parsing messages with hickory.
///
/// There is no retry and no cache. The caller bounds the exchange with a
/// timeout.
#[derive(Debug, Clone, Default)]
pub struct HickoryDnsClient;

impl HickoryDnsClient {
    pub fn new() -> Self {
        Self
    }

    fn build_query(domain: &str, record_type: RecordType) -> Result<(u16, Vec<u8>), DnsError> {
        let name = Name::from_str(domain)
            .map_err(|e| DnsError::InvalidQuery(format!("'{}': {}", domain, e)))?;

        let id: u16 = rand::random();
        let mut message = Message::new();
        message.set_id(id);
        message.set_message_type(MessageType::Query);
        message.set_op_code(OpCode::Query);
        message.set_recursion_desired(true);
        message.add_query(Query::query(name, record_type));

        let bytes = message
            .to_vec()
            .map_err(|e| DnsError::InvalidQuery(format!("'{}': {}", domain, e)))?;
        Ok((id, bytes))
    }
}

/// Resolves `host:port` to a socket address, preferring the first result.
async fn resolve_nameserver(nameserver: &str) -> Result<SocketAddr, DnsError> {
    if let Ok(addr) = nameserver.parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host(nameserver)
        .await
        .map_err(|_| DnsError::InvalidNameserver(nameserver.to_string()))?
        .next()
        .ok_or_else(|| DnsError::InvalidNameserver(nameserver.to_string()))
}

fn transport(server: SocketAddr, e: std::io::Error) -> DnsError {
    DnsError::Transport(format!("{}: {}", server, e))
}

#[async_trait]
impl DnsClient for HickoryDnsClient {
    async fn exchange(
        &self,
        nameserver: &str,
        domain: &str,
        record_type: RecordType,
    ) -> Result<DnsExchange, DnsError> {
        let server = resolve_nameserver(nameserver).await?;
        let (id, query) = Self::build_query(domain, record_type)?;

        let bind_addr: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await.map_err(|e| transport(server, e))?;
        // A connected socket only receives datagrams from the nameserver.
        socket.connect(server).await.map_err(|e| transport(server, e))?;

        let start = Instant::now();
        socket.send(&query).await.map_err(|e| transport(server, e))?;

        let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let len = socket.recv(&mut buf).await.map_err(|e| transport(server, e))?;
            let response =
                Message::from_vec(&buf[..len]).map_err(|e| DnsError::Malformed(e.to_string()))?;
            if response.id() != id || response.message_type() != MessageType::Response {
                trace!(%server, expected = id, got = response.id(), "Ignoring unrelated datagram");
                continue;
            }
            let rtt = start.elapsed();

            debug!(
                %server,
                domain,
                rcode = %response.response_code(),
                answers = response.answers().len(),
                rtt_ms = rtt.as_secs_f64() * 1000.0,
                "DNS response received"
            );

            return Ok(DnsExchange {
                answers: response.answers().iter().map(|r| r.record_type()).collect(),
                response_code: response.response_code(),
                rtt,
            });
        }
    }
}
