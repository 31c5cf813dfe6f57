//! The order sync engine.
//!
//! [`OrderSyncApi`] reconciles remote marketplace orders into local storage. It runs in two modes:
//! * **Incremental** (the default): walk the seller's order search feed newest-first and stop at the stored
//!   watermark, minus a fixed overlap window to absorb clock skew and late index updates upstream.
//! * **Targeted**: the caller names the order ids (webhook dispatch does this) and each one is fetched and
//!   upserted unconditionally.
//!
//! Every changed order is enriched before the upsert: payment entries gain their fee breakdown from the
//! payments API, and each shipment is resolved to its full record plus tracking events and cost breakdown.
//! Enrichment and per-order failures are isolated; one bad order never aborts the run.
use std::future::Future;

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use meli_tools::{MeliApiError, OrderSummary};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    api::vault::{CredentialVaultApi, VaultError, MARKETPLACE},
    db_types::{Integration, NewOrderRecord, SyncSummary, UpsertOutcome},
    helpers::{parse_date, shipment_ids, value_id},
    traits::{IntegrationStoreError, MarketplaceClient, OrderStoreError, SyncStorage},
};

/// How far behind the stored watermark an incremental run starts. Orders modified inside this window are
/// re-examined on every run, which makes the engine robust to late-arriving updates in the search index.
pub const OVERLAP_MINUTES: i64 = 10;
pub const PAGE_SIZE: u64 = 50;
/// Hard cap on pages walked in a single run. A run that hits the cap logs a warning and relies on the next
/// run (or a full sync) to pick up the remainder.
pub const MAX_PAGES: u32 = 20;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Organization {0} has no active marketplace integration")]
    NoActiveIntegration(String),
    #[error("No integration owns marketplace seller account {0}")]
    UnknownSeller(String),
    #[error("Integration {0} has no seller account id yet; it cannot be searched")]
    MissingSellerAccount(i64),
    #[error("Order payload for {0} carries no id")]
    MalformedOrder(String),
    #[error("Shipment {0} references no order")]
    ShipmentWithoutOrder(String),
    #[error(transparent)]
    VaultError(#[from] VaultError),
    #[error("Storage error during sync. {0}")]
    StorageError(String),
    #[error("Marketplace query failed. {0}")]
    QueryError(#[from] MeliApiError),
}

impl From<IntegrationStoreError> for SyncError {
    fn from(e: IntegrationStoreError) -> Self {
        SyncError::StorageError(e.to_string())
    }
}

impl From<OrderStoreError> for SyncError {
    fn from(e: OrderStoreError) -> Self {
        SyncError::StorageError(e.to_string())
    }
}

/// How the caller identifies the integration to sync. Manual syncs know the organization; webhook
/// notifications only carry the marketplace seller account id.
#[derive(Debug, Clone)]
pub enum SyncSelector {
    ByOrganization(String),
    BySeller(String),
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Ignore the watermark and walk the whole paging window.
    pub full: bool,
    /// Sync exactly these orders, unconditionally, instead of scanning the search feed.
    pub order_ids: Vec<String>,
    /// Restrict the search feed to orders in this status (e.g. `paid`).
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct OrderSyncApi<B, C> {
    db: B,
    client: C,
    vault: CredentialVaultApi<B, C>,
}

impl<B, C> OrderSyncApi<B, C>
where
    B: SyncStorage,
    C: MarketplaceClient + Clone,
{
    pub fn new(db: B, client: C, vault: CredentialVaultApi<B, C>) -> Self {
        Self { db, client, vault }
    }

    pub async fn resolve_integration(&self, selector: &SyncSelector) -> Result<Integration, SyncError> {
        match selector {
            SyncSelector::ByOrganization(org) => self
                .db
                .fetch_active_integration(org, MARKETPLACE)
                .await?
                .ok_or_else(|| SyncError::NoActiveIntegration(org.clone())),
            SyncSelector::BySeller(seller) => self
                .db
                .fetch_integration_for_seller(seller)
                .await?
                .ok_or_else(|| SyncError::UnknownSeller(seller.clone())),
        }
    }

    /// Runs one sync. Targeted mode when `options.order_ids` is non-empty, incremental otherwise.
    pub async fn sync(&self, selector: &SyncSelector, options: &SyncOptions) -> Result<SyncSummary, SyncError> {
        let integration = self.resolve_integration(selector).await?;
        let summary = if options.order_ids.is_empty() {
            self.sync_incremental(&integration, options).await?
        } else {
            self.sync_targeted(&integration, &options.order_ids).await?
        };
        info!(
            "🔄️ Sync for {} finished. {} candidate orders, {} created, {} updated, {} forced",
            integration.organization_id, summary.orders_found, summary.created, summary.updated, summary.forced
        );
        Ok(summary)
    }

    async fn sync_targeted(&self, integration: &Integration, order_ids: &[String]) -> Result<SyncSummary, SyncError> {
        let mut summary = SyncSummary { orders_found: order_ids.len(), ..SyncSummary::default() };
        for order_id in order_ids {
            match self.enrich_and_upsert(integration, order_id).await {
                Ok(outcome) => {
                    summary.forced += 1;
                    match outcome {
                        UpsertOutcome::Created => summary.created += 1,
                        UpsertOutcome::Updated => summary.updated += 1,
                    }
                },
                Err(e) => warn!("🔄️ Order {order_id} failed to sync: {e}. Continuing with the rest"),
            }
        }
        Ok(summary)
    }

    async fn sync_incremental(
        &self,
        integration: &Integration,
        options: &SyncOptions,
    ) -> Result<SyncSummary, SyncError> {
        let seller = integration
            .external_account_id
            .clone()
            .ok_or(SyncError::MissingSellerAccount(integration.id))?;
        let watermark = if options.full {
            info!("🔄️ Full sync requested for {}. Ignoring the watermark", integration.organization_id);
            None
        } else {
            self.db
                .last_update_watermark(&integration.organization_id, MARKETPLACE)
                .await?
                .map(|wm| wm - Duration::minutes(OVERLAP_MINUTES))
        };
        let mut summary = SyncSummary::default();
        let mut offset = 0u64;
        'pages: for page in 0..MAX_PAGES {
            let client = self.client.clone();
            let seller = seller.clone();
            let status = options.status.clone();
            let results = self
                .with_auth_retry(integration.id, move |token| {
                    let client = client.clone();
                    let seller = seller.clone();
                    let status = status.clone();
                    async move { client.search_orders(&seller, offset, PAGE_SIZE, status.as_deref(), &token).await }
                })
                .await?;
            if results.results.is_empty() {
                break;
            }
            for entry in &results.results {
                let Some(candidate) = OrderSummary::from_value(entry) else {
                    warn!("🔄️ Skipping a search result that carries no order id");
                    continue;
                };
                // The feed is newest-first, so the first entry at or behind the watermark ends the run.
                if let (Some(wm), Some(stamp)) = (watermark, candidate.last_updated) {
                    if stamp < wm {
                        debug!("🔄️ Order {} predates the watermark. Stopping", candidate.id);
                        break 'pages;
                    }
                }
                summary.orders_found += 1;
                let known = self
                    .db
                    .fetch_order_stamp(&integration.organization_id, MARKETPLACE, &candidate.id)
                    .await?;
                let unchanged = matches!((known, candidate.last_updated), (Some(k), Some(r)) if r <= k);
                if unchanged {
                    debug!("🔄️ Order {} is unchanged. Skipping", candidate.id);
                    continue;
                }
                match self.enrich_and_upsert(integration, &candidate.id).await {
                    Ok(UpsertOutcome::Created) => summary.created += 1,
                    Ok(UpsertOutcome::Updated) => summary.updated += 1,
                    Err(e) => warn!("🔄️ Order {} failed to sync: {e}. Continuing with the rest", candidate.id),
                }
            }
            offset += PAGE_SIZE;
            if offset >= results.paging.total {
                break;
            }
            if page + 1 == MAX_PAGES {
                warn!(
                    "🔄️ Stopping after {MAX_PAGES} pages with {} orders still unread. The next run will pick \
                     them up",
                    results.paging.total - offset
                );
            }
        }
        Ok(summary)
    }

    /// Fetches one order, enriches it with payment fees and shipment details, and upserts it unconditionally.
    pub async fn enrich_and_upsert(
        &self,
        integration: &Integration,
        order_id: &str,
    ) -> Result<UpsertOutcome, SyncError> {
        let client = self.client.clone();
        let id = order_id.to_string();
        let order = self
            .with_auth_retry(integration.id, move |token| {
                let client = client.clone();
                let id = id.clone();
                async move { client.get_order(&id, &token).await }
            })
            .await?;
        let external_id = value_id(&order["id"]).ok_or_else(|| SyncError::MalformedOrder(order_id.to_string()))?;
        let payments = self.enrich_payments(integration.id, &order).await;
        let shipments = self.enrich_shipments(integration.id, &order).await;
        let last_updated = parse_date(&order["last_updated"])
            .or_else(|| parse_date(&order["date_last_updated"]))
            .or_else(|| parse_date(&order["date_created"]))
            .unwrap_or_else(Utc::now);
        let record = NewOrderRecord {
            organization_id: integration.organization_id.clone(),
            marketplace: MARKETPLACE.to_string(),
            external_id,
            status: order["status"].as_str().unwrap_or("unknown").to_string(),
            status_detail: order["status_detail"].as_str().map(String::from),
            date_created: parse_date(&order["date_created"]),
            last_updated,
            buyer: order["buyer"].clone(),
            seller: order["seller"].clone(),
            line_items: order["order_items"].clone(),
            payments,
            shipments,
            raw: order,
        };
        let outcome = self.db.upsert_order(&record).await?;
        debug!("📝️ Order {} {:?} for {}", record.external_id, outcome, record.organization_id);
        Ok(outcome)
    }

    /// Returns the order's payment entries with the fee breakdown from the payments API attached to each one.
    /// Enrichment is best-effort: a payment whose detail lookup fails keeps its original shape.
    async fn enrich_payments(&self, integration_id: i64, order: &Value) -> Value {
        let Some(entries) = order["payments"].as_array() else {
            return order["payments"].clone();
        };
        let mut enriched = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(payment_id) = value_id(&entry["id"]) else {
                enriched.push(entry.clone());
                continue;
            };
            let client = self.client.clone();
            let id = payment_id.clone();
            let detail = self
                .with_auth_retry(integration_id, move |token| {
                    let client = client.clone();
                    let id = id.clone();
                    async move { client.get_payment(&id, &token).await }
                })
                .await;
            match detail {
                Ok(detail) => {
                    let mut payment = entry.clone();
                    let fee_details = detail["fee_details"].clone();
                    let total = fee_details
                        .as_array()
                        .map(|fees| fees.iter().filter_map(|f| f["amount"].as_f64()).sum::<f64>())
                        .unwrap_or(0.0);
                    // The detail endpoint sometimes reports the fee directly; its figure wins over our sum.
                    let marketplace_fee = detail["marketplace_fee"].as_f64().unwrap_or(total);
                    payment["fee_details"] = fee_details;
                    payment["fees_total"] = json!(total);
                    payment["marketplace_fee"] = json!(marketplace_fee);
                    payment["fees_fetched_at"] = json!(Utc::now());
                    enriched.push(payment);
                },
                Err(e) => {
                    warn!("🔄️ Could not fetch fees for payment {payment_id}: {e}. Keeping the bare entry");
                    enriched.push(entry.clone());
                },
            }
        }
        Value::Array(enriched)
    }

    /// Resolves every shipment referenced by the order to its full record plus tracking and cost breakdowns.
    /// Tracking and costs are optional extras upstream and come back as `null` when unavailable.
    async fn enrich_shipments(&self, integration_id: i64, order: &Value) -> Value {
        let mut enriched = Vec::new();
        for shipment_id in shipment_ids(order) {
            let client = self.client.clone();
            let id = shipment_id.clone();
            let shipment = self
                .with_auth_retry(integration_id, move |token| {
                    let client = client.clone();
                    let id = id.clone();
                    async move { client.get_shipment(&id, &token).await }
                })
                .await;
            let shipment = match shipment {
                Ok(shipment) => shipment,
                Err(e) => {
                    warn!("🔄️ Could not fetch shipment {shipment_id}: {e}");
                    enriched.push(json!({ "id": shipment_id, "error": e.to_string() }));
                    continue;
                },
            };
            let tracking = self.fetch_shipment_extra(integration_id, &shipment_id, Extra::Tracking).await;
            let costs = self.fetch_shipment_extra(integration_id, &shipment_id, Extra::Costs).await;
            enriched.push(json!({
                "id": shipment_id,
                "shipment": shipment,
                "tracking": tracking,
                "costs": costs,
                "fetched_at": Utc::now(),
            }));
        }
        Value::Array(enriched)
    }

    async fn fetch_shipment_extra(&self, integration_id: i64, shipment_id: &str, extra: Extra) -> Value {
        let client = self.client.clone();
        let id = shipment_id.to_string();
        let result = self
            .with_auth_retry(integration_id, move |token| {
                let client = client.clone();
                let id = id.clone();
                async move {
                    match extra {
                        Extra::Tracking => client.get_shipment_tracking(&id, &token).await,
                        Extra::Costs => client.get_shipment_costs(&id, &token).await,
                    }
                }
            })
            .await;
        match result {
            Ok(value) => value,
            Err(e) => {
                // Not every carrier exposes these, so a miss is routine.
                debug!("🔄️ No {extra:?} for shipment {shipment_id}: {e}");
                Value::Null
            },
        }
    }

    /// Resolves a shipment to the order it belongs to. Webhook dispatch uses this to turn a shipment
    /// notification into an order sync.
    pub async fn order_for_shipment(&self, selector: &SyncSelector, shipment_id: &str) -> Result<String, SyncError> {
        let integration = self.resolve_integration(selector).await?;
        let client = self.client.clone();
        let id = shipment_id.to_string();
        let shipment = self
            .with_auth_retry(integration.id, move |token| {
                let client = client.clone();
                let id = id.clone();
                async move { client.get_shipment(&id, &token).await }
            })
            .await?;
        value_id(&shipment["order_id"])
            .or_else(|| value_id(&shipment["order"]["id"]))
            .ok_or_else(|| SyncError::ShipmentWithoutOrder(shipment_id.to_string()))
    }

    /// Runs a marketplace call with a valid access token. If the marketplace rejects the token anyway, the
    /// token is force-refreshed and the call retried exactly once; a second rejection is treated as a failed
    /// refresh rather than retried further.
    pub async fn with_auth_retry<T, F, Fut>(&self, integration_id: i64, call: F) -> Result<T, SyncError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, MeliApiError>>,
    {
        let token = self.vault.get_valid_access_token(integration_id).await?;
        match call(token).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_auth_error() => {
                warn!("🔄️ The marketplace rejected the token for integration {integration_id} ({e}). Refreshing \
                       and retrying once");
                let token = self.vault.refresh_now(integration_id).await?;
                call(token).await.map_err(|e| {
                    if e.is_auth_error() {
                        SyncError::VaultError(VaultError::RefreshFailure { id: integration_id, reason: e.to_string() })
                    } else {
                        e.into()
                    }
                })
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Extra {
    Tracking,
    Costs,
}
