use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewOrderRecord, OrderRecord, UpsertOutcome};

/// The maximum `last_updated` across stored orders for the pair. `None` when nothing has been synced yet.
pub async fn last_update_watermark(
    organization_id: &str,
    marketplace: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let watermark: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT MAX(last_updated) FROM marketplace_orders WHERE organization_id = $1 AND marketplace = $2",
    )
    .bind(organization_id)
    .bind(marketplace)
    .fetch_one(conn)
    .await?;
    Ok(watermark)
}

pub async fn fetch_order_stamp(
    organization_id: &str,
    marketplace: &str,
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let stamp: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT last_updated FROM marketplace_orders WHERE organization_id = $1 AND marketplace = $2 AND external_id \
         = $3",
    )
    .bind(organization_id)
    .bind(marketplace)
    .bind(external_id)
    .fetch_optional(conn)
    .await?;
    Ok(stamp)
}

pub async fn fetch_order(
    organization_id: &str,
    marketplace: &str,
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderRecord>, sqlx::Error> {
    let order = sqlx::query_as(
        "SELECT * FROM marketplace_orders WHERE organization_id = $1 AND marketplace = $2 AND external_id = $3",
    )
    .bind(organization_id)
    .bind(marketplace)
    .bind(external_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Inserts or overwrites the order, keyed on (organization, marketplace, external id). On conflict every
/// mutable field is replaced and `last_synced_at`/`updated_at` are bumped; `created_at` is preserved.
pub async fn upsert_order(
    record: &NewOrderRecord,
    conn: &mut SqliteConnection,
) -> Result<UpsertOutcome, sqlx::Error> {
    let existing =
        fetch_order_stamp(&record.organization_id, &record.marketplace, &record.external_id, &mut *conn).await?;
    sqlx::query(
        r#"
        INSERT INTO marketplace_orders (
            organization_id, marketplace, external_id, status, status_detail, date_created, last_updated,
            buyer, seller, line_items, payments, shipments, raw
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (organization_id, marketplace, external_id) DO UPDATE SET
            status = excluded.status,
            status_detail = excluded.status_detail,
            date_created = excluded.date_created,
            last_updated = excluded.last_updated,
            buyer = excluded.buyer,
            seller = excluded.seller,
            line_items = excluded.line_items,
            payments = excluded.payments,
            shipments = excluded.shipments,
            raw = excluded.raw,
            last_synced_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&record.organization_id)
    .bind(&record.marketplace)
    .bind(&record.external_id)
    .bind(&record.status)
    .bind(&record.status_detail)
    .bind(record.date_created)
    .bind(record.last_updated)
    .bind(record.buyer.to_string())
    .bind(record.seller.to_string())
    .bind(record.line_items.to_string())
    .bind(record.payments.to_string())
    .bind(record.shipments.to_string())
    .bind(record.raw.to_string())
    .execute(conn)
    .await?;
    let outcome = if existing.is_some() { UpsertOutcome::Updated } else { UpsertOutcome::Created };
    match outcome {
        UpsertOutcome::Created => debug!("📝️ Order [{}] inserted", record.external_id),
        UpsertOutcome::Updated => trace!("📝️ Order [{}] overwritten", record.external_id),
    }
    Ok(outcome)
}
