//! Utility functions shared by every probe.
//!
//! This module provides:
//! - `TimedResult`, the uniform probe result shape
//! - The deadline wrapper for single probes
//! - Deadline-bounded fan-out for probe groups

mod fanout;
mod timing;

pub use fanout::join_all_within;
pub use timing::{duration_to_ms, timed, with_timeout, TimedResult};
