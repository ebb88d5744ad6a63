//! Change notifications from the record store and their delivery to hubs
//!
//! This module provides:
//! - `Channel` / `TypedEvent`: the subscribed channels and their decoded payloads
//! - `NotificationSource`: transport beneath the listener (`PgNotificationSource`)
//! - `ChangeListener`: subscription, keep-alive and the sequential receive loop
//! - `Dispatcher`: hydrates the affected entity and publishes to the hubs

mod dispatcher;
mod listener;
mod source;
mod types;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use listener::{ChangeListener, ListenerConfig, ListenerSession, SessionState};
pub use source::{NotificationSource, PgNotificationSource};
pub use types::{
    BookingAccepted, BookingCreated, ChangeNotification, Channel, DecodeError, EntityPayload,
    InventoryLow, TypedEvent,
};

#[cfg(test)]
pub(crate) mod mock;
