//! Routes decoded notifications to hubs after hydrating the affected entity

use super::types::{
    BookingAccepted, BookingCreated, ChangeNotification, Channel, DecodeError, EntityPayload,
    InventoryLow, TypedEvent,
};
use crate::hub::HubSet;
use crate::store::{Booking, InventoryItem, RecordStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a notification was dropped
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("failed to load {entity} {id}: {source}")]
    Hydrate {
        entity: &'static str,
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// What a successful dispatch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub event: &'static str,
    /// Number of publish calls issued
    pub publishes: usize,
}

/// Stateless per call: decode, hydrate, publish.
pub struct Dispatcher {
    store: Arc<dyn RecordStore>,
    hubs: HubSet,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn RecordStore>, hubs: HubSet) -> Self {
        Self { store, hubs }
    }

    #[cfg(test)]
    pub(crate) fn hubs(&self) -> &HubSet {
        &self.hubs
    }

    pub async fn dispatch(
        &self,
        notification: &ChangeNotification,
    ) -> Result<DispatchOutcome, DispatchError> {
        match TypedEvent::decode(notification)? {
            TypedEvent::BookingCreated(evt) => self.booking_created(evt).await,
            TypedEvent::BookingAccepted(evt) => self.booking_accepted(evt).await,
            TypedEvent::InventoryLow(evt) => self.inventory_low(evt).await,
        }
    }

    async fn booking_created(&self, evt: BookingCreated) -> Result<DispatchOutcome, DispatchError> {
        let event = Channel::BookingCreated.event_name();
        let booking = self.load_booking(&evt.booking_id).await?;

        self.hubs
            .admin
            .broadcast(event, &EntityPayload::Booking(Box::new(booking)));
        Ok(DispatchOutcome {
            event,
            publishes: 1,
        })
    }

    /// Publish to each assigned cleaner. The booking is loaded once, before
    /// any publish, so a failed load publishes nothing.
    async fn booking_accepted(
        &self,
        evt: BookingAccepted,
    ) -> Result<DispatchOutcome, DispatchError> {
        let event = Channel::BookingAccepted.event_name();
        let booking = self.load_booking(&evt.booking_id).await?;
        let unassigned = unassigned_cleaners(&booking, &evt.cleaner_ids);
        if !unassigned.is_empty() {
            warn!(
                booking_id = %evt.booking_id,
                cleaners = ?unassigned,
                "Notified cleaners are not assigned to the stored booking"
            );
        }
        let booking = EntityPayload::Booking(Box::new(booking));

        let mut seen = HashSet::new();
        let mut publishes = 0;
        for cleaner_id in evt.cleaner_ids {
            if cleaner_id.is_empty() || !seen.insert(cleaner_id.clone()) {
                continue;
            }
            self.hubs.employee.publish(cleaner_id, event, &booking);
            publishes += 1;
        }

        debug!(booking_id = %evt.booking_id, cleaners = publishes, "Booking accepted fan-out");
        Ok(DispatchOutcome { event, publishes })
    }

    async fn inventory_low(&self, evt: InventoryLow) -> Result<DispatchOutcome, DispatchError> {
        let event = Channel::InventoryLow.event_name();
        let item = self.load_item(&evt.item_id).await?;

        self.hubs
            .admin
            .broadcast(event, &EntityPayload::InventoryItem(item));
        Ok(DispatchOutcome {
            event,
            publishes: 1,
        })
    }

    async fn load_booking(&self, id: &str) -> Result<Booking, DispatchError> {
        self.store
            .get_booking_by_id(id)
            .await
            .map_err(|source| DispatchError::Hydrate {
                entity: "booking",
                id: id.to_string(),
                source,
            })
    }

    async fn load_item(&self, id: &str) -> Result<InventoryItem, DispatchError> {
        self.store
            .get_inventory_item_by_id(id)
            .await
            .map_err(|source| DispatchError::Hydrate {
                entity: "inventory item",
                id: id.to_string(),
                source,
            })
    }
}

/// Notified ids missing from the booking's stored assignment
fn unassigned_cleaners<'a>(booking: &Booking, notified: &'a [String]) -> Vec<&'a str> {
    let assigned: HashSet<&str> = booking.cleaner_ids().into_iter().collect();
    notified
        .iter()
        .map(String::as_str)
        .filter(|id| !id.is_empty() && !assigned.contains(id))
        .collect()
}
