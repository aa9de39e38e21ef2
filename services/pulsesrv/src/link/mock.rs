//! Mock link for testing
//!
//! Scripted stand-in for the serial device. Each call to `open` consumes
//! the next queued session; a session replays its events in order and then
//! blocks like an idle serial line.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{LineSource, LinkPort};
use crate::error::{PulseSrvError, Result};

/// One scripted read result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// A line delivered by the device
    Line(String),
    /// A read failure, as on unplug
    Fault(String),
}

#[derive(Debug)]
enum MockSession {
    Refuse(String),
    Events(VecDeque<MockEvent>),
}

#[derive(Debug)]
struct MockState {
    present: AtomicBool,
    opens: AtomicU64,
    sessions: Mutex<VecDeque<MockSession>>,
}

/// Scripted link port
#[derive(Debug, Clone)]
pub struct MockLink {
    state: Arc<MockState>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLink {
    /// Device present, no sessions queued
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                present: AtomicBool::new(true),
                opens: AtomicU64::new(0),
                sessions: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Simulate plugging or unplugging the device
    pub fn set_present(&self, present: bool) {
        self.state.present.store(present, Ordering::SeqCst);
    }

    /// Queue a session delivering `lines`, then idling
    pub fn push_session<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_events(lines.into_iter().map(|l| MockEvent::Line(l.into())));
    }

    /// Queue a session replaying `events`, then idling
    pub fn push_events(&self, events: impl IntoIterator<Item = MockEvent>) {
        self.state
            .sessions
            .lock()
            .push_back(MockSession::Events(events.into_iter().collect()));
    }

    /// Queue a failing open
    pub fn push_refusal(&self, reason: impl Into<String>) {
        self.state
            .sessions
            .lock()
            .push_back(MockSession::Refuse(reason.into()));
    }

    /// Number of open attempts so far
    pub fn open_count(&self) -> u64 {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Sessions not yet consumed
    pub fn pending_sessions(&self) -> usize {
        self.state.sessions.lock().len()
    }
}

#[async_trait]
impl LinkPort for MockLink {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    async fn device_present(&self) -> bool {
        self.state.present.load(Ordering::SeqCst)
    }

    async fn open(&self) -> Result<Box<dyn LineSource>> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);

        let session = self.state.sessions.lock().pop_front();
        match session {
            Some(MockSession::Events(events)) => {
                debug!("Mock link opened with {} scripted events", events.len());
                Ok(Box::new(MockLines { events }))
            },
            Some(MockSession::Refuse(reason)) => Err(PulseSrvError::link_unavailable(reason)),
            None => Err(PulseSrvError::link_unavailable("no mock session queued")),
        }
    }
}

struct MockLines {
    events: VecDeque<MockEvent>,
}

#[async_trait]
impl LineSource for MockLines {
    async fn next_line(&mut self) -> Result<String> {
        match self.events.pop_front() {
            Some(MockEvent::Line(line)) => Ok(line),
            Some(MockEvent::Fault(reason)) => Err(PulseSrvError::link(reason)),
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sessions_replay_in_order() {
        let link = MockLink::new();
        link.push_refusal("busy");
        link.push_events([
            MockEvent::Line("a".to_string()),
            MockEvent::Fault("unplugged".to_string()),
        ]);

        assert!(matches!(
            link.open().await,
            Err(PulseSrvError::LinkUnavailable(_))
        ));

        let mut lines = link.open().await.unwrap();
        assert_eq!(lines.next_line().await.unwrap(), "a");
        assert!(matches!(
            lines.next_line().await,
            Err(PulseSrvError::Link(_))
        ));

        assert!(link.open().await.is_err());
        assert_eq!(link.open_count(), 3);
        assert_eq!(link.pending_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_session_idles() {
        let link = MockLink::new();
        link.push_session(Vec::<String>::new());

        let mut lines = link.open().await.unwrap();
        let read = tokio::time::timeout(Duration::from_secs(60), lines.next_line()).await;
        assert!(read.is_err());
    }

    #[tokio::test]
    async fn test_presence_toggle() {
        let link = MockLink::new();
        assert!(link.device_present().await);

        let observer = link.clone();
        link.set_present(false);
        assert!(!observer.device_present().await);
    }
}
