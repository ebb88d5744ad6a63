//! Notification transport beneath the change listener

use super::types::ChangeNotification;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgListener;

/// A subscribe-by-name notification channel.
///
/// `recv` must be cancel-safe: the listener drops a pending `recv` whenever
/// its keep-alive timer or cancellation fires first.
#[async_trait]
pub trait NotificationSource: Send {
    /// Subscribe to every channel in `channels`
    async fn listen_all(&mut self, channels: &[&str]) -> Result<()>;

    /// Wait for the next notification
    async fn recv(&mut self) -> Result<ChangeNotification>;

    /// Lightweight liveness check
    async fn ping(&mut self) -> Result<()>;

    /// Drop every subscription
    async fn unlisten_all(&mut self) -> Result<()>;
}

/// PostgreSQL `LISTEN/NOTIFY` through sqlx.
///
/// `PgListener` reconnects and re-issues `LISTEN` for every subscribed
/// channel on its own when the connection drops; the error that surfaced the
/// drop is still returned from `recv` once.
pub struct PgNotificationSource {
    listener: PgListener,
}

impl PgNotificationSource {
    pub async fn connect(url: &str) -> Result<Self> {
        let listener = PgListener::connect(url)
            .await
            .context("Failed to open the notification connection")?;
        Ok(Self { listener })
    }
}

#[async_trait]
impl NotificationSource for PgNotificationSource {
    async fn listen_all(&mut self, channels: &[&str]) -> Result<()> {
        self.listener
            .listen_all(channels.iter().copied())
            .await
            .with_context(|| format!("LISTEN {}", channels.join(", ")))
    }

    async fn recv(&mut self) -> Result<ChangeNotification> {
        let notification = self.listener.recv().await?;
        Ok(ChangeNotification::new(
            notification.channel(),
            notification.payload(),
        ))
    }

    async fn ping(&mut self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&mut self.listener).await?;
        Ok(())
    }

    async fn unlisten_all(&mut self) -> Result<()> {
        self.listener.unlisten_all().await?;
        Ok(())
    }
}
