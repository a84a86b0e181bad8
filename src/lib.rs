//! domain_diagnostics library: live network health checks for a domain or IP
//!
//! This library runs four categories of diagnostics against a single target and
//! returns structured, serializable reports:
//!
//! - DNS: record lookups with TTLs, authoritative nameservers, propagation,
//!   DNSSEC, SPF/DMARC and TXT categorisation
//! - SMTP: EHLO handshake, STARTTLS/SMTPS and port reachability per MX host
//! - SSL/TLS: certificate inspection, protocol and cipher support, scoring
//! - Blacklist: DNSBL listings with reliability-weighted risk
//!
//! # Example
//!
//! ```no_run
//! use domain_diagnostics::{DiagnosticEngine, DiagnosticsConfig, ProbeTarget};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DiagnosticEngine::new(DiagnosticsConfig::default())?;
//! let target = ProbeTarget::parse("example.com")?;
//!
//! let report = engine.smtp_report(&target).await?;
//! println!(
//!     "{} of {} MX hosts answered in {:.0}ms",
//!     report.results.summary.responsive_servers,
//!     report.results.summary.total_servers,
//!     report.query_metrics.total_time_ms
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

pub mod blacklist;
pub mod config;
pub mod diagnostics;
pub mod dns;
pub mod error_handling;
pub mod initialization;
pub mod smtp;
pub mod target;
pub mod tls;
pub mod utils;

// Re-export public API
pub use config::{DiagnosticsConfig, LogFormat, LogLevel};
pub use diagnostics::{CategoryOutcome, DiagnosticEngine, DiagnosticReport, FullDiagnostics};
pub use error_handling::DiagnosticError;
pub use target::{ProbeTarget, ValidatedDomain};
