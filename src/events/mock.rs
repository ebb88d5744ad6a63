//! Channel-fed mock implementation of NotificationSource for testing.

use super::source::NotificationSource;
use super::types::ChangeNotification;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct SourceState {
    listening: Mutex<Vec<String>>,
    unlisten_calls: AtomicUsize,
    pings: AtomicUsize,
    fail_ping: AtomicBool,
}

/// Yields whatever the paired [`MockSourceHandle`] pushes. When the handle is
/// dropped, `recv` waits forever, like an idle database.
pub struct MockNotificationSource {
    rx: mpsc::UnboundedReceiver<Result<ChangeNotification, String>>,
    state: Arc<SourceState>,
    fail_listen: bool,
}

/// Test-side control of a [`MockNotificationSource`]
#[derive(Clone)]
pub struct MockSourceHandle {
    tx: mpsc::UnboundedSender<Result<ChangeNotification, String>>,
    state: Arc<SourceState>,
}

impl MockNotificationSource {
    pub fn new() -> (Self, MockSourceHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(SourceState::default());
        (
            Self {
                rx,
                state: state.clone(),
                fail_listen: false,
            },
            MockSourceHandle { tx, state },
        )
    }

    /// A source whose initial subscription fails
    pub fn unreachable() -> (Self, MockSourceHandle) {
        let (mut source, handle) = Self::new();
        source.fail_listen = true;
        (source, handle)
    }
}

impl MockSourceHandle {
    pub fn notify(&self, channel: &str, payload: &str) {
        let _ = self.tx.send(Ok(ChangeNotification::new(channel, payload)));
    }

    /// Make the next pending `recv` fail with `message`
    pub fn fail_recv(&self, message: &str) {
        let _ = self.tx.send(Err(message.to_string()));
    }

    pub fn fail_pings(&self, fail: bool) {
        self.state.fail_ping.store(fail, Ordering::SeqCst);
    }

    pub fn listening(&self) -> Vec<String> {
        self.state.listening.lock().unwrap().clone()
    }

    pub fn unlisten_calls(&self) -> usize {
        self.state.unlisten_calls.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSource for MockNotificationSource {
    async fn listen_all(&mut self, channels: &[&str]) -> Result<()> {
        if self.fail_listen {
            bail!("connection refused");
        }
        let mut listening = self.state.listening.lock().unwrap();
        listening.extend(channels.iter().map(|c| c.to_string()));
        Ok(())
    }

    async fn recv(&mut self) -> Result<ChangeNotification> {
        match self.rx.recv().await {
            Some(Ok(notification)) => Ok(notification),
            Some(Err(message)) => Err(anyhow!(message)),
            None => std::future::pending().await,
        }
    }

    async fn ping(&mut self) -> Result<()> {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_ping.load(Ordering::SeqCst) {
            bail!("ping failed");
        }
        Ok(())
    }

    async fn unlisten_all(&mut self) -> Result<()> {
        self.state.unlisten_calls.fetch_add(1, Ordering::SeqCst);
        self.state.listening.lock().unwrap().clear();
        Ok(())
    }
}
