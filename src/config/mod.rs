//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, ports, resolver addresses)
//! - Log option types
//! - The `DiagnosticsConfig` timeout budget struct

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{DiagnosticsConfig, LogFormat, LogLevel, MailPorts};
