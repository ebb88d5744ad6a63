//! Test helper factories
//!
//! Convenience functions for creating store entities with sensible defaults,
//! and a builder for mock server state.
#![allow(dead_code)]

use crate::api::handlers::{RealtimeState, ServerState};
use crate::events::{ListenerSession, SessionState};
use crate::hub::HubSet;
use crate::store::{BaseBooking, Booking, CleanerAssigned, InventoryItem};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Create a booking whose assigned cleaners have the given ids
pub fn test_booking(id: &str, cleaner_ids: &[&str]) -> Booking {
    let start = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
    Booking {
        id: id.to_string(),
        base: BaseBooking {
            id: format!("base-{}", id),
            cust_id: "cust-1".to_string(),
            customer_first_name: "Ada".to_string(),
            customer_last_name: "Lovelace".to_string(),
            address: "12 Analytical Row".to_string(),
            start_sched: start,
            end_sched: start + chrono::Duration::hours(3),
            dirty_scale: 3,
            payment_status: "UNPAID".to_string(),
            review_status: "PENDING".to_string(),
            photos: vec![],
            created_at: start - chrono::Duration::days(2),
            updated_at: None,
            quote_id: None,
        },
        main_service_id: format!("svc-{}", id),
        addon_ids: vec![],
        equipment_ids: vec![],
        resource_ids: vec![],
        cleaners: cleaner_ids.iter().map(|c| test_cleaner(c)).collect(),
        total_price: 180.0,
    }
}

pub fn test_cleaner(id: &str) -> CleanerAssigned {
    CleanerAssigned {
        id: id.to_string(),
        cleaner_first_name: format!("Cleaner {}", id),
        cleaner_last_name: "Test".to_string(),
        pfp_url: None,
    }
}

/// Create a consumable inventory item with a max quantity of 20
pub fn test_inventory_item(id: &str, quantity: i32) -> InventoryItem {
    InventoryItem {
        id: id.to_string(),
        name: format!("Item {}", id),
        item_type: "resource".to_string(),
        status: if quantity > 5 { "HIGH" } else { "LOW" }.to_string(),
        unit: "bottle".to_string(),
        quantity,
        max_quantity: 20,
        is_available: quantity > 0,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        updated_at: None,
    }
}

/// Create server state around `hubs` with a fixed listener snapshot
pub fn mock_server_state(hubs: HubSet, listener_state: SessionState) -> RealtimeState {
    let (_tx, listener) = watch::channel(ListenerSession {
        state: listener_state,
        ..ListenerSession::default()
    });
    Arc::new(ServerState {
        hubs,
        listener,
        shutdown: CancellationToken::new(),
        write_timeout: Duration::from_secs(1),
        ping_interval: Duration::from_secs(30),
    })
}
