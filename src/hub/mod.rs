//! In-process publish/subscribe hubs for live client connections
//!
//! This module provides:
//! - `Connection`: write half of a client transport (`WsConnection` for axum)
//! - `AudienceRegistry`: connection membership, flat or keyed
//! - `Hub`: single-loop actor serializing register/unregister/publish
//! - `HubSet`: the admin, employee and chat hubs shared across the server

mod actor;
pub mod connection;
mod envelope;
pub mod registry;
mod set;

pub use actor::Hub;
pub use connection::{Connection, ConnectionError, ConnectionId, Frame, WsConnection};
pub use envelope::EventEnvelope;
pub use registry::{AudienceRegistry, BroadcastRegistry, HubStats, KeyedRegistry};
pub use set::{AdminHub, ChatHub, EmployeeHub, HubSet, HubSetStats};

#[cfg(test)]
pub(crate) mod mock;
