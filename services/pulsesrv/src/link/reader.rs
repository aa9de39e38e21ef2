//! Link reader
//!
//! Keeps the serial link alive forever and feeds decoded telegrams into the
//! counter store:
//!
//! ```text
//! Disconnected --device present--> Connecting --open ok--> Streaming
//!      ^                              |                       |
//!      |                          open failed     read fault / bad line
//!      |                              v                       |
//!      +---------backoff------------ Error <------------------+
//! ```
//!
//! Every step runs against a cancellation token. Cancellation lands only on
//! an await point (poll sleep, open, line read, backoff sleep); applying a
//! telegram to the store never awaits, so an increment is either fully
//! applied or not started when the reader stops.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{LineSource, LinkMonitor, LinkPort, LinkState, LinkStats};
use crate::error::PulseSrvError;
use crate::store::{CounterStore, Counters};
use crate::telegram::{self, Frame};

/// Reconnect timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPolicy {
    /// Interval between device existence checks while disconnected
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Wait after a fault before re-checking the device
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(10),
        }
    }
}

enum Step {
    Disconnected,
    Connecting,
    Streaming(Box<dyn LineSource>),
    Error(PulseSrvError),
}

/// Drives a [`LinkPort`] through the reconnect state machine
pub struct LinkReader<P: LinkPort> {
    port: P,
    store: Arc<CounterStore>,
    policy: LinkPolicy,
    monitor: LinkMonitor,
}

impl<P: LinkPort> LinkReader<P> {
    pub fn new(port: P, store: Arc<CounterStore>, policy: LinkPolicy) -> Self {
        Self {
            port,
            store,
            policy,
            monitor: LinkMonitor::new(),
        }
    }

    /// Handle for observing the reader while it runs
    pub fn monitor(&self) -> LinkMonitor {
        self.monitor.clone()
    }

    /// Run until `cancel` fires. Returns the final statistics.
    pub async fn run(self, cancel: CancellationToken) -> LinkStats {
        info!("Link reader started on {}", self.port.describe());

        let mut step = Step::Disconnected;
        loop {
            step = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.advance(step) => next,
            };
        }

        self.monitor.update(|stats| stats.state = LinkState::Stopped);
        info!("Link reader stopped");
        self.monitor.snapshot()
    }

    async fn advance(&self, step: Step) -> Step {
        match step {
            Step::Disconnected => {
                self.enter(LinkState::Disconnected);
                self.wait_for_device().await;
                Step::Connecting
            },
            Step::Connecting => {
                self.enter(LinkState::Connecting);
                self.connect().await
            },
            Step::Streaming(lines) => {
                self.enter(LinkState::Streaming);
                Step::Error(self.stream(lines).await)
            },
            Step::Error(err) => {
                self.enter(LinkState::Error);
                self.record_fault(&err);
                warn!(
                    "serial error: {} (will try again in {:?})",
                    err, self.policy.retry_backoff
                );
                tokio::time::sleep(self.policy.retry_backoff).await;
                Step::Disconnected
            },
        }
    }

    fn enter(&self, state: LinkState) {
        self.monitor.update(|stats| stats.state = state);
    }

    async fn wait_for_device(&self) {
        if self.port.device_present().await {
            return;
        }

        warn!("device {} not found, waiting for it", self.port.describe());
        loop {
            tokio::time::sleep(self.policy.poll_interval).await;
            if self.port.device_present().await {
                debug!("device {} appeared", self.port.describe());
                return;
            }
        }
    }

    async fn connect(&self) -> Step {
        self.monitor.update(|stats| stats.connect_attempts += 1);

        match self.port.open().await {
            Ok(lines) => {
                info!("Connected to {}", self.port.describe());
                self.monitor.update(|stats| {
                    stats.sessions += 1;
                    stats.last_connected = Some(SystemTime::now());
                });
                Step::Streaming(lines)
            },
            Err(err) => Step::Error(err),
        }
    }

    /// Read until something goes wrong; the returned error ends the session
    async fn stream(&self, mut lines: Box<dyn LineSource>) -> PulseSrvError {
        loop {
            let line = match lines.next_line().await {
                Ok(line) => line,
                Err(err) => return err,
            };

            match telegram::decode(&line) {
                Ok(Frame::Header) => {
                    debug!("header received: {}", line.trim_end());
                    self.monitor.update(|stats| stats.headers += 1);
                },
                Ok(Frame::Telegram(telegram)) => {
                    debug!("{}", telegram);
                    apply_pulses(&self.store, &telegram.pulses);
                    self.monitor.update(|stats| stats.telegrams += 1);
                },
                Err(err) => return err.into(),
            }
        }
    }

    fn record_fault(&self, err: &PulseSrvError) {
        self.monitor.update(|stats| {
            stats.faults += 1;
            if err.is_protocol() {
                stats.protocol_faults += 1;
            }
            stats.last_error = Some(err.to_string());
        });
    }
}

/// Apply pulses to the store. The state file write blocks, so on a
/// multi-threaded runtime the worker hands its other tasks off first.
fn apply_pulses(store: &CounterStore, pulses: &Counters) {
    if Handle::current().runtime_flavor() == RuntimeFlavor::MultiThread {
        tokio::task::block_in_place(|| store.increment(pulses));
    } else {
        store.increment(pulses);
    }
}
