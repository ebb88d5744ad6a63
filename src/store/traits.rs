//! Trait abstraction over the system-of-record

use super::models::{Booking, InventoryItem};
use anyhow::Result;
use async_trait::async_trait;

/// Read access to full business entities.
///
/// Implementations must be safe to call from any task; the dispatcher shares
/// one instance behind an `Arc`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a booking with its base details and assigned cleaners
    async fn get_booking_by_id(&self, id: &str) -> Result<Booking>;

    /// Load an inventory item
    async fn get_inventory_item_by_id(&self, id: &str) -> Result<InventoryItem>;
}
