//! PostgreSQL implementation of [`RecordStore`]

use super::models::{BaseBooking, Booking, CleanerAssigned, InventoryItem};
use super::traits::RecordStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::debug;

/// Row of `booking.bookings`: references to the parts of a booking
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    base_booking_id: String,
    main_service_id: String,
    addon_ids: Vec<String>,
    equipment_ids: Vec<String>,
    resource_ids: Vec<String>,
    cleaner_ids: Vec<String>,
    total_price: f32,
}

/// Record store backed by a sqlx connection pool
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url` and wrap it.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("Failed to connect to the record store database")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_booking_by_id(&self, id: &str) -> Result<Booking> {
        // One transaction so the booking and its parts come from one snapshot.
        let mut tx = self.pool.begin().await?;

        let row: BookingRow = sqlx::query_as(
            r#"
            SELECT base_booking_id::text AS base_booking_id,
                   main_service_id::text AS main_service_id,
                   COALESCE(addon_ids::text[], '{}') AS addon_ids,
                   COALESCE(equipment_ids::text[], '{}') AS equipment_ids,
                   COALESCE(resource_ids::text[], '{}') AS resource_ids,
                   COALESCE(cleaner_ids::text[], '{}') AS cleaner_ids,
                   total_price::real AS total_price
            FROM booking.bookings
            WHERE id::text = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("fetch booking row {}", id))?
        .with_context(|| format!("booking not found: {}", id))?;

        let base = load_base_booking(&mut tx, &row.base_booking_id).await?;
        let cleaners = load_cleaners(&mut tx, &row.cleaner_ids).await?;
        tx.commit().await?;

        debug!(booking_id = %id, cleaners = cleaners.len(), "Booking loaded");

        Ok(Booking {
            id: id.to_string(),
            base,
            main_service_id: row.main_service_id,
            addon_ids: row.addon_ids,
            equipment_ids: row.equipment_ids,
            resource_ids: row.resource_ids,
            cleaners,
            total_price: row.total_price,
        })
    }

    async fn get_inventory_item_by_id(&self, id: &str) -> Result<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT id::text AS id, name, type, status, unit, quantity, max_quantity,
                   is_available, created_at, updated_at
            FROM inventory.items
            WHERE id::text = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("could not fetch inventory item with id {}", id))?
        .with_context(|| format!("inventory item not found: {}", id))
    }
}

async fn load_base_booking(tx: &mut Transaction<'_, Postgres>, id: &str) -> Result<BaseBooking> {
    sqlx::query_as::<_, BaseBooking>(
        r#"
        SELECT id::text AS id, cust_id::text AS cust_id, customer_first_name,
               customer_last_name, address, start_sched, end_sched, dirty_scale,
               payment_status, review_status, COALESCE(photos, '{}') AS photos,
               created_at, updated_at, quote_id::text AS quote_id
        FROM booking.basebookings
        WHERE id::text = $1
        "#,
    )
    .bind(id)
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("load base booking {}", id))
}

async fn load_cleaners(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[String],
) -> Result<Vec<CleanerAssigned>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, CleanerAssigned>(
        r#"
        SELECT id::text AS id,
               cleanerFirstName AS cleaner_first_name,
               cleanerLastName AS cleaner_last_name,
               pfpUrl AS pfp_url
        FROM booking.cleaners
        WHERE id::text = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .context("query cleaners")
}
