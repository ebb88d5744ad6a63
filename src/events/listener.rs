//! Long-lived change listener
//!
//! Subscribes once to the fixed channel set, then runs a loop that selects
//! over cancellation, the next notification and a keep-alive timer.
//! Notifications are dispatched one at a time, in arrival order: the dispatch
//! for notification N completes before N+1 is read.

use super::dispatcher::Dispatcher;
use super::source::NotificationSource;
use super::types::{ChangeNotification, Channel};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing knobs of the listener loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Interval between keep-alive queries
    pub keepalive: Duration,
    /// First delay after a receive error
    pub reconnect_min: Duration,
    /// Cap for the doubling receive-error delay
    pub reconnect_max: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(90),
            reconnect_min: Duration::from_secs(10),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unsubscribed,
    Subscribed,
}

/// Observable state of the listener session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListenerSession {
    pub state: SessionState,
    pub channels: Vec<String>,
    pub last_keepalive: Option<DateTime<Utc>>,
    pub received: u64,
    pub dispatched: u64,
    pub dropped: u64,
}

pub struct ChangeListener<S> {
    source: S,
    dispatcher: Arc<Dispatcher>,
    config: ListenerConfig,
    session: watch::Sender<ListenerSession>,
}

impl<S: NotificationSource + 'static> ChangeListener<S> {
    pub fn new(source: S, dispatcher: Arc<Dispatcher>, config: ListenerConfig) -> Self {
        let (session, _) = watch::channel(ListenerSession::default());
        Self {
            source,
            dispatcher,
            config,
            session,
        }
    }

    /// Watch the session state (for health reporting)
    pub fn session(&self) -> watch::Receiver<ListenerSession> {
        self.session.subscribe()
    }

    /// Subscribe to every known channel, then spawn the receive loop.
    ///
    /// Only the initial subscription can fail; the server cannot run without
    /// its upstream feed, so callers treat the error as fatal. The loop ends
    /// when `cancel` fires.
    pub async fn start(mut self, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        let channels: Vec<&str> = Channel::ALL.iter().map(|c| c.as_str()).collect();
        self.source
            .listen_all(&channels)
            .await
            .context("Failed to subscribe to change notifications")?;

        self.session.send_modify(|s| {
            s.state = SessionState::Subscribed;
            s.channels = channels.iter().map(|c| c.to_string()).collect();
        });
        info!(channels = ?channels, "Listening for change notifications");

        Ok(tokio::spawn(self.run(cancel)))
    }

    async fn run(mut self, cancel: CancellationToken) {
        let mut keepalive = interval(self.config.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first immediate tick
        keepalive.tick().await;

        let mut backoff: Option<Duration> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                received = self.source.recv() => match received {
                    Ok(notification) => {
                        backoff = None;
                        self.handle(notification).await;
                    }
                    Err(e) => {
                        let delay = next_backoff(backoff, &self.config);
                        backoff = Some(delay);
                        warn!(retry_in = ?delay, "Notification receive failed: {:#}", e);
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = sleep(delay) => {}
                        }
                    }
                },

                _ = keepalive.tick() => self.keep_alive().await,
            }
        }

        self.shutdown().await;
    }

    async fn handle(&mut self, notification: ChangeNotification) {
        debug!(channel = %notification.channel, payload = %notification.payload, "Notification received");
        self.session.send_modify(|s| s.received += 1);

        match self.dispatcher.dispatch(&notification).await {
            Ok(outcome) => {
                self.session.send_modify(|s| s.dispatched += 1);
                debug!(
                    channel = %notification.channel,
                    event = %outcome.event,
                    publishes = outcome.publishes,
                    "Notification dispatched"
                );
            }
            Err(e) => {
                self.session.send_modify(|s| s.dropped += 1);
                error!(channel = %notification.channel, "Dropping notification: {}", e);
            }
        }
    }

    async fn keep_alive(&mut self) {
        match self.source.ping().await {
            Ok(()) => {
                self.session
                    .send_modify(|s| s.last_keepalive = Some(Utc::now()));
                debug!("Listener keep-alive ok");
            }
            Err(e) => error!("Listener ping error: {:#}", e),
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down change listener");
        if let Err(e) = self.source.unlisten_all().await {
            warn!("Failed to unlisten: {:#}", e);
        }
        self.session.send_modify(|s| {
            s.state = SessionState::Unsubscribed;
            s.channels.clear();
        });
    }
}

/// `reconnect_min` on the first error, then doubling up to `reconnect_max`.
fn next_backoff(previous: Option<Duration>, config: &ListenerConfig) -> Duration {
    match previous {
        None => config.reconnect_min,
        Some(d) => d.saturating_mul(2).min(config.reconnect_max),
    }
}
