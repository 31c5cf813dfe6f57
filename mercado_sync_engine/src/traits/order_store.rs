use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{NewOrderRecord, OrderRecord, UpsertOutcome};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

/// Storage for synchronized marketplace orders, keyed by (organization, marketplace, external id).
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    /// The maximum `last_updated` across stored orders for the pair, or `None` when nothing has been synced
    /// yet. The sync engine derives its incremental watermark from this; it is never persisted separately.
    async fn last_update_watermark(
        &self,
        organization_id: &str,
        marketplace: &str,
    ) -> Result<Option<DateTime<Utc>>, OrderStoreError>;

    /// The stored `last_updated` stamp for a single order, if the order exists locally.
    async fn fetch_order_stamp(
        &self,
        organization_id: &str,
        marketplace: &str,
        external_id: &str,
    ) -> Result<Option<DateTime<Utc>>, OrderStoreError>;

    async fn fetch_order(
        &self,
        organization_id: &str,
        marketplace: &str,
        external_id: &str,
    ) -> Result<Option<OrderRecord>, OrderStoreError>;

    /// Inserts or overwrites the order. On conflict every mutable field is replaced and
    /// `last_synced_at`/`updated_at` are bumped.
    async fn upsert_order(&self, record: &NewOrderRecord) -> Result<UpsertOutcome, OrderStoreError>;
}
