//! Fake DNS endpoints for unit tests.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;
use trust_dns_resolver::proto::op::{Message, MessageType, ResponseCode};
use trust_dns_resolver::proto::rr::rdata::{A, MX, TXT};
use trust_dns_resolver::proto::rr::{Name, RData, Record, RecordType};

use super::wire::{decode, encode};

/// A NOERROR response echoing the query's ID and question, with no answers.
pub(crate) fn response_to(query: &[u8]) -> Message {
    let query = decode(query).expect("query decodes");
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(query.op_code())
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true)
        .set_response_code(ResponseCode::NoError)
        .add_queries(query.queries().to_vec());
    response
}

/// Encodes a scripted response.
pub(crate) fn encode_reply(response: &Message) -> Vec<u8> {
    encode(response).expect("response encodes")
}

/// Builds a response whose answers are `(ttl, rdata)` owned by the question name.
pub(crate) fn build_response(query: &[u8], answers: &[(u32, RData)]) -> Vec<u8> {
    let mut response = response_to(query);
    let owner = response.queries()[0].name().clone();
    for (ttl, rdata) in answers {
        response.add_answer(Record::from_rdata(owner.clone(), *ttl, rdata.clone()));
    }
    encode_reply(&response)
}

/// An empty response carrying `code`.
pub(crate) fn build_rcode_response(query: &[u8], code: ResponseCode) -> Vec<u8> {
    let mut response = response_to(query);
    response.set_response_code(code);
    encode_reply(&response)
}

/// Question type of a raw query.
pub(crate) fn query_type(query: &[u8]) -> RecordType {
    decode(query).expect("query decodes").queries()[0].query_type()
}

/// Question name of a raw query, lowercased and without the trailing dot.
pub(crate) fn query_name(query: &[u8]) -> String {
    let name = decode(query).expect("query decodes").queries()[0].name().to_ascii();
    name.trim_end_matches('.').to_ascii_lowercase()
}

pub(crate) fn a(ip: [u8; 4]) -> RData {
    RData::A(A(Ipv4Addr::from(ip)))
}

pub(crate) fn mx(preference: u16, exchange: &str) -> RData {
    let exchange = Name::from_ascii(format!("{exchange}.")).expect("valid exchange");
    RData::MX(MX::new(preference, exchange))
}

pub(crate) fn txt(text: &str) -> RData {
    RData::TXT(TXT::new(vec![text.to_string()]))
}

/// Spawns a UDP responder on localhost; `respond` maps each query to the datagrams sent back.
pub(crate) async fn spawn_udp_responder<F>(respond: F) -> SocketAddr
where
    F: Fn(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind udp");
    let addr = socket.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            for reply in respond(&buf[..len]) {
                let _ = socket.send_to(&reply, peer).await;
            }
        }
    });
    addr
}
