//! Incremental SMTP greeting/EHLO reply parser.
//!
//! The parser is fed one reply line at a time and never touches a socket,
//! so the conversation state machine can be tested on its own:
//!
//! ```text
//! AwaitingGreeting --220 last line--> AwaitingCapabilities --250 last line--> Complete
//!        |                                    |
//!        +------ any other code -------> Failed <------+
//! ```
//!
//! Capability lines are interpreted as they arrive: STARTTLS and AUTH are
//! recorded immediately on any 250 line. The first line is the server
//! identity unless it already names an extension, and a closing line such
//! as `250 OK` only becomes a feature when it names one.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::MAX_SMTP_REPLY_LINES;
use crate::error_handling::SmtpError;

/// Registered ESMTP service extensions.
const EXTENSION_KEYWORDS: &[&str] = &[
    "8BITMIME",
    "AUTH",
    "BINARYMIME",
    "BURL",
    "CHECKPOINT",
    "CHUNKING",
    "DELIVERBY",
    "DSN",
    "ENHANCEDSTATUSCODES",
    "ETRN",
    "EXPN",
    "FUTURERELEASE",
    "HELP",
    "LIMITS",
    "MT-PRIORITY",
    "MTRK",
    "NO-SOLICITING",
    "ONEX",
    "PIPELINING",
    "REQUIRETLS",
    "RRVS",
    "SIZE",
    "SMTPUTF8",
    "STARTTLS",
    "TURN",
    "VERB",
    "VRFY",
];

/// True for a registered extension or a private `X...` one.
fn is_extension_keyword(keyword: &str) -> bool {
    EXTENSION_KEYWORDS.contains(&keyword)
        || (keyword.len() > 1
            && keyword.starts_with('X')
            && keyword
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-'))
}

/// One line of an SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Three-digit status code.
    pub code: u16,
    /// `false` for `NNN-` continuation lines.
    pub last: bool,
    /// Text after the separator.
    pub text: String,
}

/// Splits `NNN-text` / `NNN text` / `NNN` into its parts.
///
/// # Errors
///
/// Returns `SmtpError::MalformedLine` when the line does not start with
/// three digits followed by a space, a dash or the end of the line.
pub fn parse_reply_line(raw: &str) -> Result<ReplyLine, SmtpError> {
    let line = raw.trim_end_matches(['\r', '\n']);
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(SmtpError::MalformedLine(line.to_string()));
    }
    let code = line[..3]
        .parse::<u16>()
        .map_err(|_| SmtpError::MalformedLine(line.to_string()))?;
    let (last, text) = match bytes.get(3) {
        None => (true, ""),
        Some(b' ') => (true, &line[4..]),
        Some(b'-') => (false, &line[4..]),
        Some(_) => return Err(SmtpError::MalformedLine(line.to_string())),
    };
    Ok(ReplyLine {
        code,
        last,
        text: text.to_string(),
    })
}

/// Where the conversation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParserState {
    /// Waiting for the 220 greeting to finish.
    AwaitingGreeting,
    /// EHLO sent; collecting 250 lines.
    AwaitingCapabilities,
    /// Final 250 line seen.
    Complete,
    /// The server answered with an unexpected code.
    Failed,
}

/// Value of one advertised extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Keyword without parameters.
    Enabled(bool),
    /// Parameters as sent, space-separated.
    Params(String),
}

/// What a completed EHLO conversation revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpHandshake {
    /// First greeting line.
    pub banner: String,
    /// Name the server gave in the first EHLO line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_identity: Option<String>,
    /// Extension keyword (upper-case) to parameters or `true`.
    pub features: BTreeMap<String, FeatureValue>,
    /// STARTTLS was advertised.
    pub tls_supported: bool,
    /// AUTH mechanisms in advertised order, without duplicates.
    pub auth_methods: Vec<String>,
}

/// Line-fed parser for the greeting and EHLO replies.
#[derive(Debug)]
pub struct EhloParser {
    state: ParserState,
    lines_seen: usize,
    banner: Option<String>,
    server_identity: Option<String>,
    capability_lines: usize,
    features: BTreeMap<String, FeatureValue>,
    tls_supported: bool,
    auth_methods: Vec<String>,
}

impl Default for EhloParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EhloParser {
    /// A parser waiting for the greeting.
    pub fn new() -> Self {
        EhloParser {
            state: ParserState::AwaitingGreeting,
            lines_seen: 0,
            banner: None,
            server_identity: None,
            capability_lines: 0,
            features: BTreeMap::new(),
            tls_supported: false,
            auth_methods: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// STARTTLS seen so far.
    pub fn tls_supported(&self) -> bool {
        self.tls_supported
    }

    /// AUTH mechanisms seen so far.
    pub fn auth_methods(&self) -> &[String] {
        &self.auth_methods
    }

    /// Consumes one reply line and returns the state after it.
    ///
    /// # Errors
    ///
    /// Moves to `Failed` and returns the reason on a malformed line, a
    /// non-220 greeting, a non-250 EHLO reply, or too many lines. Lines fed
    /// after `Complete` or `Failed` are ignored.
    pub fn feed_line(&mut self, raw: &str) -> Result<ParserState, SmtpError> {
        if matches!(self.state, ParserState::Complete | ParserState::Failed) {
            return Ok(self.state);
        }
        self.lines_seen += 1;
        if self.lines_seen > MAX_SMTP_REPLY_LINES {
            return self.fail(SmtpError::ReplyTooLarge("line count"));
        }
        let line = match parse_reply_line(raw) {
            Ok(line) => line,
            Err(e) => return self.fail(e),
        };

        match self.state {
            ParserState::AwaitingGreeting => {
                if line.code != 220 {
                    return self.fail(SmtpError::UnexpectedGreeting(raw.trim_end().to_string()));
                }
                if self.banner.is_none() {
                    self.banner = Some(line.text);
                }
                if line.last {
                    self.state = ParserState::AwaitingCapabilities;
                }
            }
            ParserState::AwaitingCapabilities => {
                if line.code != 250 {
                    return self.fail(SmtpError::EhloRejected(raw.trim_end().to_string()));
                }
                self.capability_line(&line.text, line.last);
                if line.last {
                    self.state = ParserState::Complete;
                }
            }
            ParserState::Complete | ParserState::Failed => {}
        }
        Ok(self.state)
    }

    fn fail(&mut self, error: SmtpError) -> Result<ParserState, SmtpError> {
        self.state = ParserState::Failed;
        Err(error)
    }

    fn capability_line(&mut self, text: &str, last: bool) {
        self.capability_lines += 1;
        let text = text.trim();
        let (keyword, params) = match text.split_once(|c: char| c == ' ' || c == '=') {
            Some((k, p)) => (k.to_ascii_uppercase(), p.trim()),
            None => (text.to_ascii_uppercase(), ""),
        };
        if keyword.is_empty() {
            return;
        }

        let known = is_extension_keyword(&keyword);
        if self.capability_lines == 1 && !known {
            // "mx.example.com Hello [192.0.2.1]"
            self.server_identity = text.split_whitespace().next().map(str::to_string);
            return;
        }
        // A closing "250 OK" is not an extension
        if last && !known {
            return;
        }

        match keyword.as_str() {
            "STARTTLS" => self.tls_supported = true,
            "AUTH" => {
                for mechanism in params.split_whitespace() {
                    let mechanism = mechanism.to_ascii_uppercase();
                    if !self.auth_methods.contains(&mechanism) {
                        self.auth_methods.push(mechanism);
                    }
                }
            }
            _ => {}
        }

        let value = if params.is_empty() {
            FeatureValue::Enabled(true)
        } else {
            FeatureValue::Params(params.to_string())
        };
        // Legacy "AUTH=" lines must not overwrite the standard form
        self.features.entry(keyword).or_insert(value);
    }

    /// Result of a completed conversation, `None` before `Complete`.
    pub fn finish(self) -> Option<SmtpHandshake> {
        if self.state != ParserState::Complete {
            return None;
        }
        Some(SmtpHandshake {
            banner: self.banner.unwrap_or_default(),
            server_identity: self.server_identity,
            features: self.features,
            tls_supported: self.tls_supported,
            auth_methods: self.auth_methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> (EhloParser, Result<ParserState, SmtpError>) {
        let mut parser = EhloParser::new();
        let mut last = Ok(parser.state());
        for line in lines {
            last = parser.feed_line(line);
            if last.is_err() {
                break;
            }
        }
        (parser, last)
    }

    #[test]
    fn test_parse_reply_line_forms() {
        assert_eq!(
            parse_reply_line("250-SIZE 35882577\r\n").unwrap(),
            ReplyLine {
                code: 250,
                last: false,
                text: "SIZE 35882577".to_string()
            }
        );
        assert!(parse_reply_line("250 OK").unwrap().last);
        assert!(parse_reply_line("250").unwrap().last);
        assert!(parse_reply_line("25").is_err());
        assert!(parse_reply_line("abc OK").is_err());
        assert!(parse_reply_line("250xOK").is_err());
    }

    #[test]
    fn test_starttls_and_auth_detected() {
        let (parser, last) = run(&[
            "220 mx.example.com ESMTP\r\n",
            "250-mx.example.com Hello\r\n",
            "250-STARTTLS\r\n",
            "250-AUTH PLAIN LOGIN\r\n",
            "250 OK\r\n",
        ]);
        assert_eq!(last, Ok(ParserState::Complete));
        let handshake = parser.finish().unwrap();
        assert!(handshake.tls_supported);
        assert_eq!(handshake.auth_methods, vec!["PLAIN", "LOGIN"]);
        assert_eq!(handshake.banner, "mx.example.com ESMTP");
        assert_eq!(handshake.server_identity.as_deref(), Some("mx.example.com"));
    }

    #[test]
    fn test_capabilities_without_identity_line() {
        let (parser, last) = run(&[
            "220 mx.example.com ESMTP",
            "250-STARTTLS",
            "250-AUTH PLAIN LOGIN",
            "250 OK",
        ]);
        assert_eq!(last, Ok(ParserState::Complete));
        let handshake = parser.finish().unwrap();
        assert!(handshake.tls_supported);
        assert_eq!(handshake.auth_methods, vec!["PLAIN", "LOGIN"]);
        assert_eq!(handshake.server_identity, None);
        assert!(!handshake.features.contains_key("OK"));
        assert_eq!(handshake.features.len(), 2);
    }

    #[test]
    fn test_private_extension_on_closing_line() {
        let (parser, _) = run(&["220 ready", "250-mx.example.com", "250 X-EXPS GSSAPI"]);
        let handshake = parser.finish().unwrap();
        assert_eq!(
            handshake.features.get("X-EXPS"),
            Some(&FeatureValue::Params("GSSAPI".to_string()))
        );
    }

    #[test]
    fn test_capabilities_recognized_before_completion() {
        let mut parser = EhloParser::new();
        parser.feed_line("220 ready").unwrap();
        parser.feed_line("250-mx.example.com").unwrap();
        parser.feed_line("250-STARTTLS").unwrap();
        assert!(parser.tls_supported());
        assert_eq!(parser.state(), ParserState::AwaitingCapabilities);
        parser.feed_line("250-AUTH LOGIN").unwrap();
        assert_eq!(parser.auth_methods(), ["LOGIN"]);
    }

    #[test]
    fn test_feature_map_values() {
        let (parser, _) = run(&[
            "220 ready",
            "250-mx.example.com",
            "250-SIZE 35882577",
            "250-8BITMIME",
            "250-AUTH LOGIN PLAIN",
            "250-AUTH=LOGIN PLAIN XOAUTH2",
            "250-pipelining",
            "250 SMTPUTF8",
        ]);
        let handshake = parser.finish().unwrap();
        assert_eq!(
            handshake.features.get("SIZE"),
            Some(&FeatureValue::Params("35882577".to_string()))
        );
        assert_eq!(handshake.features.get("8BITMIME"), Some(&FeatureValue::Enabled(true)));
        assert_eq!(handshake.features.get("PIPELINING"), Some(&FeatureValue::Enabled(true)));
        assert_eq!(handshake.features.get("SMTPUTF8"), Some(&FeatureValue::Enabled(true)));
        assert_eq!(
            handshake.features.get("AUTH"),
            Some(&FeatureValue::Params("LOGIN PLAIN".to_string()))
        );
        assert_eq!(handshake.auth_methods, vec!["LOGIN", "PLAIN", "XOAUTH2"]);
        assert!(!handshake.tls_supported);
    }

    #[test]
    fn test_multiline_greeting() {
        let (parser, last) = run(&["220-mx.example.com ESMTP", "220 no UCE"]);
        assert_eq!(last, Ok(ParserState::AwaitingCapabilities));
        assert_eq!(parser.banner.as_deref(), Some("mx.example.com ESMTP"));
    }

    #[test]
    fn test_rejecting_greeting_fails() {
        let (parser, last) = run(&["554 No SMTP service here"]);
        assert_eq!(
            last,
            Err(SmtpError::UnexpectedGreeting("554 No SMTP service here".to_string()))
        );
        assert_eq!(parser.state(), ParserState::Failed);
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_rejected_ehlo_fails() {
        let (_, last) = run(&["220 ready", "502 Command not implemented"]);
        assert!(matches!(last, Err(SmtpError::EhloRejected(_))));
    }

    #[test]
    fn test_single_line_ehlo_reply() {
        let (parser, last) = run(&["220 ready", "250 mx.example.com"]);
        assert_eq!(last, Ok(ParserState::Complete));
        let handshake = parser.finish().unwrap();
        assert!(handshake.features.is_empty());
        assert_eq!(handshake.server_identity.as_deref(), Some("mx.example.com"));
    }

    #[test]
    fn test_too_many_lines() {
        let mut parser = EhloParser::new();
        parser.feed_line("220 ready").unwrap();
        let mut result = Ok(ParserState::AwaitingCapabilities);
        for _ in 0..MAX_SMTP_REPLY_LINES {
            result = parser.feed_line("250-X");
        }
        assert_eq!(result, Err(SmtpError::ReplyTooLarge("line count")));
    }

    #[test]
    fn test_lines_after_completion_ignored() {
        let (mut parser, _) = run(&["220 ready", "250 mx"]);
        assert_eq!(parser.feed_line("garbage"), Ok(ParserState::Complete));
    }

    #[test]
    fn test_handshake_serializes_camel_case() {
        let (parser, _) = run(&["220 ready", "250-mx", "250 STARTTLS"]);
        let json = serde_json::to_value(parser.finish().unwrap()).unwrap();
        assert_eq!(json["tlsSupported"], true);
        assert_eq!(json["features"]["STARTTLS"], true);
    }
}
