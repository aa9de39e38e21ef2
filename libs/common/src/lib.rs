//! Shared service plumbing for the pulse counter daemon
//!
//! Provides the pieces every long-running service binary needs, independent
//! of what it actually serves:
//! - logging initialisation (console + size-rotated log file)
//! - HTTP request logging middleware
//! - graceful shutdown signal handling
//! - service metadata and startup banner

pub mod error;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use error::{Error, Result};

/// Default host the HTTP API binds to
pub const DEFAULT_API_HOST: &str = "0.0.0.0";
