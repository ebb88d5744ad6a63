//! Hub: a single processing loop that owns one audience registry
//!
//! ## Design
//!
//! `Hub` is a cheap, cloneable handle around an unbounded mpsc sender. A
//! background task owns the registry and applies commands one at a time:
//! 1. `register` / `unregister` mutate membership
//! 2. `publish` writes one pre-serialized frame to every member of a key,
//!    evicting (remove + close) any connection whose write fails
//! 3. `ping` writes a Ping frame to one connection, evicting it on failure
//! 4. `stats` replies over a oneshot with the registry size
//!
//! All commands share one channel, so they are applied in the order they were
//! sent. Nothing outside the loop ever sees the registry, so there are no
//! locks. Sending never blocks and never fails from the caller's point of
//! view: delivery is best-effort, at most once.

use super::connection::{Connection, ConnectionId, Frame};
use super::envelope::EventEnvelope;
use super::registry::{AudienceRegistry, BroadcastRegistry, HubStats};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

enum HubCommand<K> {
    Register {
        id: ConnectionId,
        key: K,
        conn: Box<dyn Connection>,
    },
    Unregister {
        id: ConnectionId,
        key: K,
    },
    Publish {
        key: K,
        event: String,
        frame: Frame,
    },
    Ping {
        id: ConnectionId,
        key: K,
    },
    Stats(oneshot::Sender<HubStats>),
}

/// Handle to a running hub.
pub struct Hub<R: AudienceRegistry> {
    name: Arc<str>,
    commands: mpsc::UnboundedSender<HubCommand<R::Key>>,
}

impl<R: AudienceRegistry> Clone for Hub<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            commands: self.commands.clone(),
        }
    }
}

impl<R: AudienceRegistry> Hub<R> {
    /// Spawn the processing loop on the current tokio runtime.
    ///
    /// The loop runs until every handle has been dropped.
    pub fn spawn(name: &str, registry: R) -> Self {
        let name: Arc<str> = Arc::from(name);
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_loop(name.clone(), registry, rx));
        Self { name, commands: tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admit a connection. Register each accepted connection exactly once.
    pub fn register(&self, id: ConnectionId, key: R::Key, conn: Box<dyn Connection>) {
        self.send(HubCommand::Register { id, key, conn });
    }

    /// Remove and close a connection. No-op if it is not registered.
    pub fn unregister(&self, id: ConnectionId, key: R::Key) {
        self.send(HubCommand::Unregister { id, key });
    }

    /// Send `{event, data}` to every connection registered under `key`.
    ///
    /// The envelope is serialized here, once; a serialization failure drops
    /// the event.
    pub fn publish<T: Serialize + ?Sized>(&self, key: R::Key, event: &str, data: &T) {
        let frame = match EventEnvelope::new(event, data).encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(hub = %self.name, event = %event, "Failed to serialize event: {}", e);
                return;
            }
        };
        self.send(HubCommand::Publish {
            key,
            event: event.to_string(),
            frame,
        });
    }

    /// Write a ping to one connection. A failed write evicts it like a failed
    /// publish. No-op if the connection is not registered.
    pub fn ping(&self, id: ConnectionId, key: R::Key) {
        self.send(HubCommand::Ping { id, key });
    }

    /// Current registry size, or `None` if the loop is gone.
    ///
    /// The reply is produced after every previously sent command has been
    /// applied.
    pub async fn stats(&self) -> Option<HubStats> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Stats(tx));
        rx.await.ok()
    }

    fn send(&self, command: HubCommand<R::Key>) {
        if self.commands.send(command).is_err() {
            debug!(hub = %self.name, "Hub loop stopped, command dropped");
        }
    }
}

impl Hub<BroadcastRegistry> {
    /// Publish to every connection on a broadcast hub.
    pub fn broadcast<T: Serialize + ?Sized>(&self, event: &str, data: &T) {
        self.publish((), event, data);
    }
}

async fn run_loop<R: AudienceRegistry>(
    name: Arc<str>,
    mut registry: R,
    mut commands: mpsc::UnboundedReceiver<HubCommand<R::Key>>,
) {
    info!(hub = %name, "Hub started");

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register { id, key, conn } => {
                if let Some(mut displaced) = registry.admit(key.clone(), id, conn) {
                    warn!(hub = %name, connection_id = %id, "Connection registered twice, closing previous handle");
                    displaced.close().await;
                }
                debug!(hub = %name, connection_id = %id, key = ?key, "Connection registered");
            }
            HubCommand::Unregister { id, key } => {
                if let Some(mut conn) = registry.remove(&key, id) {
                    conn.close().await;
                    info!(hub = %name, connection_id = %id, key = ?key, "Connection unregistered");
                }
            }
            HubCommand::Publish { key, event, frame } => {
                deliver(&name, &mut registry, &key, &event, frame).await;
            }
            HubCommand::Ping { id, key } => {
                let Some(conn) = registry.get_mut(&key, id) else {
                    continue;
                };
                let pinged = conn.send_ping().await;
                if let Err(e) = pinged {
                    debug!(hub = %name, connection_id = %id, error = %e, "Ping failed, evicting connection");
                    if let Some(mut conn) = registry.remove(&key, id) {
                        conn.close().await;
                    }
                }
            }
            HubCommand::Stats(reply) => {
                let _ = reply.send(registry.stats());
            }
        }
    }

    debug!(hub = %name, "Hub stopped");
}

/// Write `frame` to every member of `key`, evicting connections that fail.
async fn deliver<R: AudienceRegistry>(
    name: &str,
    registry: &mut R,
    key: &R::Key,
    event: &str,
    frame: Frame,
) {
    let targets = registry.members(key);
    let mut evicted = 0usize;

    for id in &targets {
        let Some(conn) = registry.get_mut(key, *id) else {
            continue;
        };
        let written = conn.send_text(frame.clone()).await;
        if let Err(e) = written {
            debug!(hub = %name, connection_id = %id, error = %e, "Write failed, evicting connection");
            if let Some(mut conn) = registry.remove(key, *id) {
                conn.close().await;
            }
            evicted += 1;
        }
    }

    debug!(
        hub = %name,
        event = %event,
        key = ?key,
        delivered = targets.len() - evicted,
        evicted,
        "Event published"
    );
}
