//! DNSBL provider table.
//!
//! Each provider answers a listed address with an A record in 127.0.0.0/8;
//! the last octet says why the address is listed. The table is static and
//! read-only for the life of the process.

use std::net::Ipv4Addr;

/// Returned for a response code the provider's table does not know.
pub const UNKNOWN_LISTING: &str = "Unknown listing type";

/// A DNS-based blocklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsblProvider {
    /// Display name.
    pub name: &'static str,
    /// Zone the reversed address is prepended to.
    pub host: &'static str,
    /// What the list covers.
    pub description: &'static str,
    /// How much a listing is trusted, 0 to 10.
    pub reliability: u8,
    /// Response code (last octet of 127.0.0.x) to listing reason.
    pub codes: &'static [(u8, &'static str)],
}

impl DnsblProvider {
    /// Listing reason for a response address.
    ///
    /// Only 127.0.0.x answers are mapped; anything else, or an unmapped last
    /// octet, is [`UNKNOWN_LISTING`].
    pub fn listing_reason(&self, response: Ipv4Addr) -> &'static str {
        let [a, b, c, d] = response.octets();
        if (a, b, c) != (127, 0, 0) {
            return UNKNOWN_LISTING;
        }
        self.codes
            .iter()
            .find(|(code, _)| *code == d)
            .map(|(_, reason)| *reason)
            .unwrap_or(UNKNOWN_LISTING)
    }
}

/// Providers queried for every address.
pub static DNSBL_PROVIDERS: &[DnsblProvider] = &[
    DnsblProvider {
        name: "Spamhaus ZEN",
        host: "zen.spamhaus.org",
        description: "Combined Spamhaus SBL, XBL and PBL",
        reliability: 10,
        codes: &[
            (2, "Spamhaus SBL: direct spam source"),
            (3, "Spamhaus SBL CSS: snowshoe spam"),
            (4, "Spamhaus XBL: exploited or infected host"),
            (9, "Spamhaus DROP: hijacked netblock"),
            (10, "Spamhaus PBL: ISP policy listing"),
            (11, "Spamhaus PBL: Spamhaus policy listing"),
        ],
    },
    DnsblProvider {
        name: "SpamCop",
        host: "bl.spamcop.net",
        description: "User-reported spam sources",
        reliability: 8,
        codes: &[(2, "Listed in SpamCop")],
    },
    DnsblProvider {
        name: "Barracuda",
        host: "b.barracudacentral.org",
        description: "Barracuda Reputation Block List",
        reliability: 9,
        codes: &[(2, "Listed in Barracuda BRBL")],
    },
    DnsblProvider {
        name: "SORBS",
        host: "dnsbl.sorbs.net",
        description: "Spam and Open Relay Blocking System",
        reliability: 7,
        codes: &[
            (2, "SORBS: open HTTP proxy"),
            (3, "SORBS: open SOCKS proxy"),
            (4, "SORBS: open proxy"),
            (5, "SORBS: open SMTP relay"),
            (6, "SORBS: spam source"),
            (7, "SORBS: vulnerable web server"),
            (8, "SORBS: blocked on request"),
            (9, "SORBS: zombie network"),
            (10, "SORBS: dynamic IP range"),
            (11, "SORBS: bad mail configuration"),
            (12, "SORBS: domain sends no mail"),
            (14, "SORBS: no server expected"),
        ],
    },
    DnsblProvider {
        name: "UCEPROTECT",
        host: "dnsbl-1.uceprotect.net",
        description: "UCEPROTECT level 1, single addresses",
        reliability: 6,
        codes: &[(2, "Listed in UCEPROTECT level 1")],
    },
    DnsblProvider {
        name: "PSBL",
        host: "psbl.surriel.com",
        description: "Passive Spam Block List",
        reliability: 6,
        codes: &[(2, "Listed in PSBL")],
    },
    DnsblProvider {
        name: "Mailspike",
        host: "bl.mailspike.net",
        description: "Mailspike blacklist",
        reliability: 7,
        codes: &[
            (2, "Mailspike: listed"),
            (10, "Mailspike: worst reputation"),
            (11, "Mailspike: very bad reputation"),
            (12, "Mailspike: bad reputation"),
            (13, "Mailspike: suspicious reputation"),
            (14, "Mailspike: neutral reputation, insufficient data"),
        ],
    },
    DnsblProvider {
        name: "DroneBL",
        host: "dnsbl.dronebl.org",
        description: "Drones, botnets and abusable proxies",
        reliability: 7,
        codes: &[
            (3, "DroneBL: IRC drone"),
            (5, "DroneBL: bottler"),
            (6, "DroneBL: unknown spambot or drone"),
            (7, "DroneBL: DDoS drone"),
            (8, "DroneBL: SOCKS proxy"),
            (9, "DroneBL: HTTP proxy"),
            (10, "DroneBL: proxy chain"),
            (13, "DroneBL: brute force attacker"),
            (14, "DroneBL: open Wingate proxy"),
            (15, "DroneBL: compromised router"),
            (17, "DroneBL: automatically detected botnet"),
        ],
    },
    DnsblProvider {
        name: "EFnet RBL",
        host: "rbl.efnetrbl.org",
        description: "EFnet IRC network blocklist",
        reliability: 5,
        codes: &[
            (1, "EFnet RBL: open proxy"),
            (2, "EFnet RBL: spamtrap 666"),
            (3, "EFnet RBL: spamtrap 50"),
            (4, "EFnet RBL: TOR exit node"),
            (5, "EFnet RBL: drones and flooding"),
        ],
    },
];
