//! Entities loaded from the record store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A booking with its base details and assigned cleaners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub base: BaseBooking,
    pub main_service_id: String,
    #[serde(default)]
    pub addon_ids: Vec<String>,
    #[serde(default)]
    pub equipment_ids: Vec<String>,
    #[serde(default)]
    pub resource_ids: Vec<String>,
    #[serde(default)]
    pub cleaners: Vec<CleanerAssigned>,
    pub total_price: f32,
}

impl Booking {
    /// Ids of the cleaners assigned to this booking
    pub fn cleaner_ids(&self) -> Vec<&str> {
        self.cleaners.iter().map(|c| c.id.as_str()).collect()
    }
}

/// Customer-facing part of a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BaseBooking {
    pub id: String,
    pub cust_id: String,
    pub customer_first_name: String,
    pub customer_last_name: String,
    pub address: String,
    pub start_sched: DateTime<Utc>,
    pub end_sched: DateTime<Utc>,
    pub dirty_scale: i32,
    pub payment_status: String,
    pub review_status: String,
    #[serde(default)]
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub quote_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CleanerAssigned {
    pub id: String,
    pub cleaner_first_name: String,
    pub cleaner_last_name: String,
    pub pfp_url: Option<String>,
}

/// An inventory item (equipment or consumable resource)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub item_type: String,
    pub status: String,
    pub unit: String,
    pub quantity: i32,
    pub max_quantity: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_booking, test_inventory_item};

    #[test]
    fn test_booking_serializes_camel_case() {
        let booking = test_booking("b1", &["e1", "e2"]);
        let json = serde_json::to_value(&booking).unwrap();

        assert_eq!(json["id"], "b1");
        assert_eq!(json["mainServiceId"], "svc-b1");
        assert_eq!(json["base"]["customerFirstName"], "Ada");
        assert_eq!(json["cleaners"][1]["id"], "e2");
        assert!(json.get("main_service_id").is_none());
    }

    #[test]
    fn test_inventory_item_type_field() {
        let item = test_inventory_item("i1", 2);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "resource");
        assert_eq!(json["maxQuantity"], 20);
        assert!(json.get("itemType").is_none());
    }

    #[test]
    fn test_cleaner_ids() {
        let booking = test_booking("b1", &["e1", "e2"]);
        assert_eq!(booking.cleaner_ids(), vec!["e1", "e2"]);
    }
}
