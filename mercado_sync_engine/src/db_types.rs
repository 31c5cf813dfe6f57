use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// One stored OAuth credential set binding an organization to a marketplace account. Created by the OAuth
/// callback flow (outside this engine), mutated by the credential vault on every successful refresh, and read
/// by the sync engine. Both token columns hold either an `enc:gcm:` tagged string or a legacy plaintext value.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Integration {
    pub id: i64,
    pub organization_id: String,
    pub marketplace: String,
    /// The seller account id on the marketplace side, as reported by the token endpoint.
    pub external_account_id: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A fully enriched order ready for upsert. The JSON fields keep the upstream shapes; `last_updated` is the
/// authoritative version marker used for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRecord {
    pub organization_id: String,
    pub marketplace: String,
    pub external_id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub buyer: Value,
    pub seller: Value,
    pub line_items: Value,
    pub payments: Value,
    pub shipments: Value,
    pub raw: Value,
}

/// A stored order row. The JSON columns come back as their serialized text; they are only deserialized when a
/// consumer actually needs to look inside.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRecord {
    pub id: i64,
    pub organization_id: String,
    pub marketplace: String,
    pub external_id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub buyer: String,
    pub seller: String,
    pub line_items: String,
    pub payments: String,
    pub shipments: String,
    pub raw: String,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// The result of one sync run. Counts are partial when individual orders failed mid-run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub orders_found: usize,
    pub created: usize,
    pub updated: usize,
    /// Orders that were upserted unconditionally because the caller supplied their ids.
    pub forced: usize,
}
