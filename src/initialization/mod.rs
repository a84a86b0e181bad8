//! Application initialization and resource setup.
//!
//! This module provides functions to initialize process-wide resources:
//! - Logger
//! - DNS resolvers
//! - TLS crypto provider

mod logger;
mod resolver;

use rustls::crypto::{ring::default_provider, CryptoProvider};

// Re-export public API
pub use logger::init_logger_with;
pub use resolver::{init_resolver, resolver_for_addr, resolver_for_server};

/// Initializes the crypto provider for TLS operations.
///
/// Configures the global crypto provider for `rustls`. This must be called before
/// any TLS connections are established.
pub fn init_crypto_provider() {
    // The return value is ignored because reinstalling the provider is harmless
    let _ = CryptoProvider::install_default(default_provider());
}
