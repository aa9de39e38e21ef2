//! Serial link layer
//!
//! A [`LinkPort`] knows how to check for and open the physical device; an
//! opened port yields a [`LineSource`] producing one telegram line at a
//! time. [`LinkReader`] drives a port through the reconnect state machine
//! and feeds decoded telegrams into the counter store.

pub mod mock;
pub mod reader;
pub mod serial;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

pub use mock::{MockEvent, MockLink};
pub use reader::{LinkPolicy, LinkReader};
pub use serial::{SerialLink, SerialLinkConfig};

/// Device side of the link
#[async_trait]
pub trait LinkPort: Send + Sync {
    /// Human readable device description for logs
    fn describe(&self) -> String;

    /// Whether the device node currently exists
    async fn device_present(&self) -> bool;

    /// Open the device with the fixed framing
    async fn open(&self) -> Result<Box<dyn LineSource>>;
}

/// An opened link, read one line at a time
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator.
    ///
    /// Blocks until a full line arrives. End of stream is an error.
    async fn next_line(&mut self) -> Result<String>;
}

/// Link reader state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Device path missing, polling for it
    Disconnected,
    /// Opening the serial port
    Connecting,
    /// Reading telegrams
    Streaming,
    /// Fault recorded, backing off before the next attempt
    Error,
    /// Reader cancelled
    Stopped,
}

/// Link reader statistics
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// Current state of the reader
    pub state: LinkState,
    /// Open attempts
    pub connect_attempts: u64,
    /// Successful opens
    pub sessions: u64,
    /// Telegrams applied to the store
    pub telegrams: u64,
    /// Header lines seen
    pub headers: u64,
    /// Faults of any kind (open failure, read failure, malformed line)
    pub faults: u64,
    /// Faults caused by malformed lines
    pub protocol_faults: u64,
    /// Description of the most recent fault
    pub last_error: Option<String>,
    /// Time of the most recent successful open
    pub last_connected: Option<SystemTime>,
}

impl LinkStats {
    fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
            connect_attempts: 0,
            sessions: 0,
            telegrams: 0,
            headers: 0,
            faults: 0,
            protocol_faults: 0,
            last_error: None,
            last_connected: None,
        }
    }
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared, cloneable view of a reader's statistics
#[derive(Debug, Clone, Default)]
pub struct LinkMonitor {
    inner: Arc<Mutex<LinkStats>>,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current statistics
    pub fn snapshot(&self) -> LinkStats {
        self.inner.lock().clone()
    }

    /// Current reader state
    pub fn state(&self) -> LinkState {
        self.inner.lock().state
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut LinkStats)) {
        f(&mut self.inner.lock());
    }
}
