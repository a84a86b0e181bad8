//! DNS message codec for the raw query path.
//!
//! Message layout, name compression and record data all come from
//! `trust_dns_resolver::proto`; this module only fixes the shape of the
//! queries we send and the few things we read back from a response.

use thiserror::Error;
use trust_dns_resolver::proto::error::ProtoError;
use trust_dns_resolver::proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_resolver::proto::rr::{Name, Record, RecordType};

/// Codec failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The query name is not a valid DNS name.
    #[error("invalid query name {name}: {reason}")]
    Name {
        /// Name as given
        name: String,
        /// Parser message
        reason: String,
    },

    /// The message could not be encoded.
    #[error("cannot encode DNS message: {0}")]
    Encode(String),

    /// The bytes are not a well-formed DNS message.
    #[error("cannot decode DNS message: {0}")]
    Decode(String),
}

/// Builds a standard query for `name`/`record_type`.
///
/// `edns_payload` adds an OPT record advertising that UDP payload size.
pub fn build_query(
    id: u16,
    name: &str,
    record_type: RecordType,
    recursion_desired: bool,
    edns_payload: Option<u16>,
) -> Result<Message, WireError> {
    let fqdn = if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    };
    let name = Name::from_ascii(&fqdn).map_err(|e| WireError::Name {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(recursion_desired)
        .add_query(Query::query(name, record_type));
    if let Some(payload) = edns_payload {
        let mut edns = Edns::new();
        edns.set_max_payload(payload);
        message.set_edns(edns);
    }
    Ok(message)
}

/// Serializes a message to wire bytes.
pub fn encode(message: &Message) -> Result<Vec<u8>, WireError> {
    message
        .to_vec()
        .map_err(|e: ProtoError| WireError::Encode(e.to_string()))
}

/// Parses wire bytes into a message.
pub fn decode(bytes: &[u8]) -> Result<Message, WireError> {
    Message::from_vec(bytes).map_err(|e| WireError::Decode(e.to_string()))
}

/// Answers of one record type.
pub fn answers_of(message: &Message, record_type: RecordType) -> impl Iterator<Item = &Record> {
    message
        .answers()
        .iter()
        .filter(move |record| record.record_type() == record_type)
}

/// TTL of the first answer of `record_type`, if any.
pub fn first_ttl(message: &Message, record_type: RecordType) -> Option<u32> {
    answers_of(message, record_type).next().map(Record::ttl)
}

/// Presentation mnemonic of a response code (`"NOERROR"`, `"SERVFAIL"`, ...).
pub fn rcode_name(code: ResponseCode) -> &'static str {
    match code {
        ResponseCode::NoError => "NOERROR",
        ResponseCode::FormErr => "FORMERR",
        ResponseCode::ServFail => "SERVFAIL",
        ResponseCode::NXDomain => "NXDOMAIN",
        ResponseCode::NotImp => "NOTIMP",
        ResponseCode::Refused => "REFUSED",
        ResponseCode::YXDomain => "YXDOMAIN",
        ResponseCode::YXRRSet => "YXRRSET",
        ResponseCode::NXRRSet => "NXRRSET",
        ResponseCode::NotAuth => "NOTAUTH",
        ResponseCode::NotZone => "NOTZONE",
        ResponseCode::BADVERS => "BADVERS",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use trust_dns_resolver::proto::rr::rdata::A;
    use trust_dns_resolver::proto::rr::RData;

    #[test]
    fn test_query_header_and_question() {
        let bytes = encode(&build_query(0xBEEF, "example.com", RecordType::MX, true, None).unwrap()).unwrap();

        assert_eq!(&bytes[0..2], &[0xBE, 0xEF]);
        // RD only
        assert_eq!(&bytes[2..4], &[0x01, 0x00]);
        // one question, no other sections
        assert_eq!(&bytes[4..12], &[0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[12..25], b"\x07example\x03com\x00");
        assert_eq!(&bytes[25..29], &[0, 15, 0, 1]);
    }

    #[test]
    fn test_edns_adds_opt_record() {
        let plain = encode(&build_query(1, "example.com", RecordType::A, false, None).unwrap()).unwrap();
        let with_edns =
            encode(&build_query(1, "example.com", RecordType::A, false, Some(4096)).unwrap()).unwrap();

        assert_eq!(&plain[10..12], &[0, 0]);
        assert_eq!(&with_edns[10..12], &[0, 1]);
        assert_eq!(&plain[2..4], &[0, 0]);

        let decoded = decode(&with_edns).unwrap();
        assert_eq!(decoded.extensions().as_ref().map(Edns::max_payload), Some(4096));
    }

    #[test]
    fn test_invalid_name_is_rejected() {
        let label = "a".repeat(64);
        let err = build_query(1, &format!("{label}.com"), RecordType::A, true, None).unwrap_err();
        assert!(matches!(err, WireError::Name { .. }));
    }

    #[test]
    fn test_decode_reads_flags_and_ttls() {
        let mut response = build_query(7, "example.com", RecordType::A, true, None).unwrap();
        let owner = Name::from_ascii("example.com.").unwrap();
        response
            .set_message_type(MessageType::Response)
            .set_authoritative(true)
            .set_response_code(ResponseCode::NoError)
            .add_answer(Record::from_rdata(
                owner,
                120,
                RData::A(A(Ipv4Addr::new(192, 0, 2, 1))),
            ));

        let decoded = decode(&encode(&response).unwrap()).unwrap();
        assert_eq!(decoded.id(), 7);
        assert_eq!(decoded.message_type(), MessageType::Response);
        assert!(decoded.authoritative());
        assert!(!decoded.truncated());
        assert_eq!(first_ttl(&decoded, RecordType::A), Some(120));
        assert_eq!(first_ttl(&decoded, RecordType::AAAA), None);
    }

    #[test]
    fn test_truncated_bytes_fail_to_decode() {
        let bytes = encode(&build_query(1, "example.com", RecordType::A, true, None).unwrap()).unwrap();
        assert!(matches!(decode(&bytes[..8]), Err(WireError::Decode(_))));
    }

    #[test]
    fn test_rcode_names() {
        assert_eq!(rcode_name(ResponseCode::NoError), "NOERROR");
        assert_eq!(rcode_name(ResponseCode::ServFail), "SERVFAIL");
        assert_eq!(rcode_name(ResponseCode::Refused), "REFUSED");
        assert_eq!(rcode_name(ResponseCode::from(0, 5)), "REFUSED");
    }
}
