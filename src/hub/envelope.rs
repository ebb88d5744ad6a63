//! The `{event, data}` frame written to clients

use super::connection::Frame;
use serde::Serialize;

/// Event envelope sent to every target connection of a publish.
///
/// `data` is polymorphic: each event name carries its own payload shape.
#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a, T: ?Sized + Serialize> {
    pub event: &'a str,
    pub data: &'a T,
}

impl<'a, T: ?Sized + Serialize> EventEnvelope<'a, T> {
    pub fn new(event: &'a str, data: &'a T) -> Self {
        Self { event, data }
    }

    /// Serialize once into a shareable text frame.
    pub fn encode(&self) -> serde_json::Result<Frame> {
        serde_json::to_string(self).map(Frame::from)
    }
}
