//! Pulse counter service
//!
//! Decodes S0 pulse counter telegrams from a serial line, accumulates the
//! per-channel counts in a durable store and serves them over HTTP.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod link;
pub mod store;
pub mod telegram;

pub use config::PulseSrvConfig;
pub use error::{PulseSrvError, Result};
pub use link::{LinkPolicy, LinkReader, LinkState, LinkStats, SerialLink};
pub use store::{CounterStore, Counters};
pub use telegram::{decode, DecodeError, Frame, Telegram, CHANNEL_COUNT};

/// Service name used for logging and the banner
pub const SERVICE_NAME: &str = "pulsesrv";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;
