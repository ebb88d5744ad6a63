//! In-memory [`Connection`] for tests.

use super::connection::{Connection, ConnectionError, Frame};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    frames: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    write_attempts: AtomicUsize,
    pings: AtomicUsize,
}

/// Records every frame written to it. Clones share state, so a test keeps one
/// clone and hands another to the hub.
#[derive(Clone, Default)]
pub struct MockConnection {
    state: Arc<MockState>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection whose writes always fail.
    pub fn failing() -> Self {
        let conn = Self::new();
        conn.fail_writes(true);
        conn
    }

    pub fn boxed(&self) -> Box<dyn Connection> {
        Box::new(self.clone())
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<String> {
        self.state.frames.lock().unwrap().clone()
    }

    /// Frames parsed as JSON
    pub fn events(&self) -> Vec<serde_json::Value> {
        self.frames()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    pub fn write_attempts(&self) -> usize {
        self.state.write_attempts.load(Ordering::SeqCst)
    }

    /// Pings successfully written
    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send_text(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.state.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport(axum::Error::new("broken pipe")));
        }
        self.state
            .frames
            .lock()
            .unwrap()
            .push(frame.as_str().to_string());
        Ok(())
    }

    async fn send_ping(&mut self) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport(axum::Error::new("broken pipe")));
        }
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.closed.store(true, Ordering::SeqCst);
    }
}
