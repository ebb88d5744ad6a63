//! Change notifications and the typed events decoded from them

use crate::store::{Booking, InventoryItem};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification channels the listener subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    BookingCreated,
    BookingAccepted,
    InventoryLow,
}

impl Channel {
    pub const ALL: [Channel; 3] = [
        Channel::BookingCreated,
        Channel::BookingAccepted,
        Channel::InventoryLow,
    ];

    /// Channel name as used in `LISTEN` / `pg_notify`
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::BookingCreated => "booking_created",
            Channel::BookingAccepted => "booking_accepted",
            Channel::InventoryLow => "inventory_low",
        }
    }

    /// Name of the client event this channel is republished as
    pub fn event_name(&self) -> &'static str {
        match self {
            Channel::BookingCreated => "booking.created",
            Channel::BookingAccepted => "booking.accepted",
            Channel::InventoryLow => "inventory.low",
        }
    }

    pub fn parse(name: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw notification as delivered by the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub channel: String,
    pub payload: String,
}

impl ChangeNotification {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreated {
    pub booking_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAccepted {
    pub booking_id: String,
    #[serde(default)]
    pub cleaner_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLow {
    pub item_id: String,
}

/// A notification decoded according to its channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedEvent {
    BookingCreated(BookingCreated),
    BookingAccepted(BookingAccepted),
    InventoryLow(InventoryLow),
}

/// Why a notification could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown notification channel: {0}")]
    UnknownChannel(String),
    #[error("malformed {channel} payload: {source}")]
    Malformed {
        channel: Channel,
        #[source]
        source: serde_json::Error,
    },
}

impl TypedEvent {
    pub fn decode(notification: &ChangeNotification) -> Result<Self, DecodeError> {
        let channel = Channel::parse(&notification.channel)
            .ok_or_else(|| DecodeError::UnknownChannel(notification.channel.clone()))?;
        let payload = notification.payload.as_str();
        let malformed = |source| DecodeError::Malformed { channel, source };

        Ok(match channel {
            Channel::BookingCreated => {
                TypedEvent::BookingCreated(serde_json::from_str(payload).map_err(malformed)?)
            }
            Channel::BookingAccepted => {
                TypedEvent::BookingAccepted(serde_json::from_str(payload).map_err(malformed)?)
            }
            Channel::InventoryLow => {
                TypedEvent::InventoryLow(serde_json::from_str(payload).map_err(malformed)?)
            }
        })
    }

    pub fn channel(&self) -> Channel {
        match self {
            TypedEvent::BookingCreated(_) => Channel::BookingCreated,
            TypedEvent::BookingAccepted(_) => Channel::BookingAccepted,
            TypedEvent::InventoryLow(_) => Channel::InventoryLow,
        }
    }
}

/// Hydrated entity published as an envelope's `data`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityPayload {
    Booking(Box<Booking>),
    InventoryItem(InventoryItem),
}
