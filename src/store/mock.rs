//! In-memory mock implementation of RecordStore for testing without PostgreSQL.

use super::models::{Booking, InventoryItem};
use super::traits::RecordStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Stores entities in `HashMap`s behind async `RwLock`s. Missing ids return an
/// error, like a `no rows` lookup would.
#[derive(Default)]
pub struct MockRecordStore {
    bookings: RwLock<HashMap<String, Booking>>,
    items: RwLock<HashMap<String, InventoryItem>>,
    lookups: AtomicUsize,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_booking(&self, booking: Booking) {
        self.bookings
            .write()
            .await
            .insert(booking.id.clone(), booking);
    }

    pub async fn insert_item(&self, item: InventoryItem) {
        self.items.write().await.insert(item.id.clone(), item);
    }

    /// Number of lookups served (hits and misses)
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn get_booking_by_id(&self, id: &str) -> Result<Booking> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.bookings
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("booking not found: {}", id))
    }

    async fn get_inventory_item_by_id(&self, id: &str) -> Result<InventoryItem> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.items
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("inventory item not found: {}", id))
    }
}
