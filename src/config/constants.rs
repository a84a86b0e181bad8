//! Configuration constants.
//!
//! This module defines the timeouts, ports, resolver addresses and other
//! operational parameters used throughout the diagnostics engine.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

// Network operation timeouts
/// Timeout for a single resolver lookup (A, MX, TXT, ...).
pub const DNS_TIMEOUT_SECS: u64 = 5;
/// Timeout for the raw UDP/TCP query used to read answer TTLs and DNSSEC records.
pub const RAW_DNS_TIMEOUT: Duration = Duration::from_secs(5);
/// TCP connection timeout in seconds
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;
/// TLS handshake timeout in seconds
pub const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
/// Budget for the full SMTP conversation with one MX host (connect, greeting, EHLO).
pub const SMTP_HOST_TIMEOUT_SECS: u64 = 30;
/// Budget for all MX hosts of a domain combined.
/// Hosts still running when this fires are reported as timed out.
pub const SMTP_GROUP_TIMEOUT_SECS: u64 = 90;
/// Timeout for one DNSBL provider lookup.
pub const DNSBL_TIMEOUT_SECS: u64 = 5;
/// Budget for every provider lookup of one address combined.
pub const DNSBL_GROUP_TIMEOUT_SECS: u64 = 15;
/// Budget for one whole diagnostic category (DNS, SMTP, SSL or blacklist).
pub const CATEGORY_TIMEOUT_SECS: u64 = 120;
/// Budget for a full TLS inspection (certificate plus both matrices).
pub const TLS_GROUP_TIMEOUT_SECS: u64 = 60;

// Well-known ports
/// DNS port for raw queries.
pub const DNS_PORT: u16 = 53;
/// Plain SMTP relay port.
pub const SMTP_PORT: u16 = 25;
/// Implicit-TLS SMTP port.
pub const SMTPS_PORT: u16 = 465;
/// Mail submission port.
pub const SUBMISSION_PORT: u16 = 587;
/// Default HTTPS port for certificate inspection.
pub const HTTPS_PORT: u16 = 443;
/// TLS-speaking ports swept by the TLS port scan.
pub const DEFAULT_TLS_PORTS: [u16; 5] = [443, 465, 993, 995, 8443];

/// Recursive resolver used for raw TTL and DNSSEC queries (Google Public DNS).
pub const RAW_QUERY_RESOLVER: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

/// Public resolvers queried directly by the propagation check.
pub const PUBLIC_RESOLVERS: [(&str, IpAddr); 4] = [
    ("Google", IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
    ("Cloudflare", IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))),
    ("Quad9", IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))),
    ("OpenDNS", IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222))),
];

/// Name announced in the EHLO command.
pub const DEFAULT_EHLO_NAME: &str = "diagnostics.local";

/// Maximum SMTP reply line we accept before treating the peer as misbehaving.
pub const MAX_SMTP_LINE_LENGTH: usize = 4096;
/// Maximum number of lines in one SMTP reply.
pub const MAX_SMTP_REPLY_LINES: usize = 128;

/// Largest DNS message we ask for over UDP (advertised through EDNS0).
pub const EDNS_UDP_PAYLOAD_SIZE: u16 = 4096;

/// Remaining certificate validity (days) below which the score is reduced.
pub const CERT_EXPIRY_WARNING_DAYS: i64 = 30;
/// Minimum acceptable RSA/DSA key size in bits.
pub const MIN_RSA_KEY_BITS: usize = 2048;
