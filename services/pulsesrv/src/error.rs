//! Error handling for the pulse counter service
//!
//! One variant per fault class. Every runtime fault is caught by the
//! component owning the resource and turned into a logged event plus a
//! recovery action; only startup faults reach `main`.

use thiserror::Error;

use crate::telegram::DecodeError;

/// Pulse counter service error type
#[derive(Error, Debug, Clone)]
pub enum PulseSrvError {
    /// Malformed telegram line; forces a reconnect
    #[error("Protocol error: {0}")]
    Protocol(#[from] DecodeError),

    /// Device path missing or the serial port could not be opened
    #[error("Link unavailable: {0}")]
    LinkUnavailable(String),

    /// Mid-stream read failure, including unplug and end of stream
    #[error("Link error: {0}")]
    Link(String),

    /// State file could not be read, parsed or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for the pulse counter service
pub type Result<T> = std::result::Result<T, PulseSrvError>;

impl PulseSrvError {
    pub fn link_unavailable(msg: impl Into<String>) -> Self {
        PulseSrvError::LinkUnavailable(msg.into())
    }

    pub fn link(msg: impl Into<String>) -> Self {
        PulseSrvError::Link(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        PulseSrvError::Persistence(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PulseSrvError::Config(msg.into())
    }

    /// Whether the fault came from the wire data rather than the link itself
    pub fn is_protocol(&self) -> bool {
        matches!(self, PulseSrvError::Protocol(_))
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<tokio_util::codec::LinesCodecError> for PulseSrvError {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        PulseSrvError::Link(err.to_string())
    }
}

impl From<figment::Error> for PulseSrvError {
    fn from(err: figment::Error) -> Self {
        PulseSrvError::Config(err.to_string())
    }
}
