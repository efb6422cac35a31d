//! Integration tests for the UDP client against an in-process nameserver.

use dns_exporter::{
    core::{DnsClient, QueryType},
    dns::{DnsError, HickoryDnsClient, Prober},
};
use hickory_resolver::proto::{
    op::{Message, MessageType, OpCode, ResponseCode},
    rr::{
        rdata::{A, CNAME},
        Name, RData, Record, RecordType,
    },
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::{net::UdpSocket, task::JoinHandle};

/// How the fake nameserver reacts to a query.
#[derive(Clone, Copy)]
enum Behavior {
    /// Answer with a CNAME followed by two A records.
    AliasAndAddresses,
    /// Answer NXDOMAIN with no records.
    NxDomain,
    /// Send a datagram with a wrong id first, then the real answer.
    StrayThenAnswer,
    /// Reply with bytes that do not decode as a DNS message.
    Garbage,
    /// Never reply.
    Silent,
}

fn reply_to(query: &Message, behavior: Behavior) -> Message {
    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(query.recursion_desired());
    response.set_recursion_available(true);
    response.add_queries(query.queries().to_vec());

    let name = query.queries()[0].name().clone();
    match behavior {
        Behavior::NxDomain => {
            response.set_response_code(ResponseCode::NXDomain);
        }
        _ => {
            let target = Name::from_str("target.example.net.").unwrap();
            response.add_answer(Record::from_rdata(
                name,
                300,
                RData::CNAME(CNAME(target.clone())),
            ));
            for last_octet in [1, 2] {
                response.add_answer(Record::from_rdata(
                    target.clone(),
                    300,
                    RData::A(A::new(192, 0, 2, last_octet)),
                ));
            }
        }
    }
    response
}

/// Binds a one-socket nameserver on localhost and serves queries until aborted.
async fn spawn_nameserver(behavior: Behavior) -> (String, JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap().to_string();

    let handle = tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(_) => return,
            };
            let query = Message::from_vec(&buf[..len]).unwrap();
            match behavior {
                Behavior::Silent => {}
                Behavior::Garbage => {
                    socket.send_to(&[0xde, 0xad, 0xbe], peer).await.unwrap();
                }
                Behavior::StrayThenAnswer => {
                    let mut stray = reply_to(&query, behavior);
                    stray.set_id(query.id().wrapping_add(1));
                    socket.send_to(&stray.to_vec().unwrap(), peer).await.unwrap();
                    let reply = reply_to(&query, behavior).to_vec().unwrap();
                    socket.send_to(&reply, peer).await.unwrap();
                }
                _ => {
                    let reply = reply_to(&query, behavior).to_vec().unwrap();
                    socket.send_to(&reply, peer).await.unwrap();
                }
            }
        }
    });
    (addr, handle)
}

#[tokio::test]
async fn test_exchange_reports_answer_types() {
    let (addr, server) = spawn_nameserver(Behavior::AliasAndAddresses).await;
    let client = HickoryDnsClient::new();

    let exchange = client
        .exchange(&addr, "www.example.com", RecordType::A)
        .await
        .unwrap();

    assert_eq!(exchange.response_code, ResponseCode::NoError);
    assert_eq!(
        exchange.answers,
        vec![RecordType::CNAME, RecordType::A, RecordType::A]
    );
    assert!(exchange.rtt < Duration::from_secs(1));
    server.abort();
}

#[tokio::test]
async fn test_prober_classifies_wire_response() {
    let (addr, server) = spawn_nameserver(Behavior::AliasAndAddresses).await;
    let prober = Prober::new(Arc::new(HickoryDnsClient::new()), Duration::from_secs(2));

    let result = prober
        .probe(&addr, "www.example.com", QueryType::A)
        .await
        .unwrap();

    assert!(result.responded);
    assert!(result.success);
    assert_eq!(result.answers.total(), 3);
    server.abort();
}

#[tokio::test]
async fn test_nxdomain_is_a_response() {
    let (addr, server) = spawn_nameserver(Behavior::NxDomain).await;
    let prober = Prober::new(Arc::new(HickoryDnsClient::new()), Duration::from_secs(2));

    let result = prober
        .probe(&addr, "missing.example.com", QueryType::A)
        .await
        .unwrap();

    assert!(result.responded);
    assert!(!result.success);
    assert_eq!(result.response_code, ResponseCode::NXDomain);
    assert_eq!(result.answers.total(), 0);
    server.abort();
}

#[tokio::test]
async fn test_mismatched_id_is_ignored() {
    let (addr, server) = spawn_nameserver(Behavior::StrayThenAnswer).await;
    let client = HickoryDnsClient::new();

    let exchange = client
        .exchange(&addr, "www.example.com", RecordType::A)
        .await
        .unwrap();

    assert_eq!(exchange.answers.len(), 3);
    server.abort();
}

#[tokio::test]
async fn test_garbage_reply_is_malformed() {
    let (addr, server) = spawn_nameserver(Behavior::Garbage).await;
    let client = HickoryDnsClient::new();

    let err = client
        .exchange(&addr, "www.example.com", RecordType::A)
        .await
        .unwrap_err();

    assert!(matches!(err, DnsError::Malformed(_)));
    assert!(!err.is_unresponsive());
    server.abort();
}

#[tokio::test]
async fn test_silent_nameserver_times_out() {
    let (addr, server) = spawn_nameserver(Behavior::Silent).await;
    let prober = Prober::new(
        Arc::new(HickoryDnsClient::new()),
        Duration::from_millis(200),
    );

    let err = prober
        .probe(&addr, "www.example.com", QueryType::A)
        .await
        .unwrap_err();

    assert_eq!(err, DnsError::Timeout(Duration::from_millis(200)));
    assert!(err.is_unresponsive());
    server.abort();
}
