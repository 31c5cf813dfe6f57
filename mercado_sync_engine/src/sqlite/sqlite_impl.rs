//! `SqliteDatabase` is the bundled storage backend for the sync engine. It implements every trait in the
//! [`crate::traits`] module on top of a connection pool.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::db::{auth, create_schema, integrations, new_pool, orders};
use crate::{
    db_types::{Integration, NewOrderRecord, OrderRecord, UpsertOutcome},
    traits::{AuthStore, AuthStoreError, IntegrationStore, IntegrationStoreError, OrderStore, OrderStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Opens (or creates) the database at `url` and makes sure the schema exists.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        create_schema(&pool).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl IntegrationStore for SqliteDatabase {
    async fn fetch_integration(&self, id: i64) -> Result<Option<Integration>, IntegrationStoreError> {
        let mut conn = self.pool.acquire().await?;
        let integration = integrations::fetch_integration(id, &mut conn).await?;
        Ok(integration)
    }

    async fn fetch_active_integration(
        &self,
        organization_id: &str,
        marketplace: &str,
    ) -> Result<Option<Integration>, IntegrationStoreError> {
        let mut conn = self.pool.acquire().await?;
        let integration = integrations::fetch_active_integration(organization_id, marketplace, &mut conn).await?;
        Ok(integration)
    }

    async fn fetch_integration_for_seller(
        &self,
        seller_external_id: &str,
    ) -> Result<Option<Integration>, IntegrationStoreError> {
        let mut conn = self.pool.acquire().await?;
        let integration = integrations::fetch_integration_for_seller(seller_external_id, &mut conn).await?;
        Ok(integration)
    }

    async fn update_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        external_account_id: Option<&str>,
    ) -> Result<Integration, IntegrationStoreError> {
        let mut conn = self.pool.acquire().await?;
        integrations::update_tokens(id, access_token, refresh_token, expires_at, external_account_id, &mut conn).await
    }
}

impl OrderStore for SqliteDatabase {
    async fn last_update_watermark(
        &self,
        organization_id: &str,
        marketplace: &str,
    ) -> Result<Option<DateTime<Utc>>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let watermark = orders::last_update_watermark(organization_id, marketplace, &mut conn).await?;
        Ok(watermark)
    }

    async fn fetch_order_stamp(
        &self,
        organization_id: &str,
        marketplace: &str,
        external_id: &str,
    ) -> Result<Option<DateTime<Utc>>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let stamp = orders::fetch_order_stamp(organization_id, marketplace, external_id, &mut conn).await?;
        Ok(stamp)
    }

    async fn fetch_order(
        &self,
        organization_id: &str,
        marketplace: &str,
        external_id: &str,
    ) -> Result<Option<OrderRecord>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(organization_id, marketplace, external_id, &mut conn).await?;
        Ok(order)
    }

    async fn upsert_order(&self, record: &NewOrderRecord) -> Result<UpsertOutcome, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let outcome = orders::upsert_order(record, &mut conn).await?;
        Ok(outcome)
    }
}

impl AuthStore for SqliteDatabase {
    async fn org_for_api_key(&self, key_hash: &str) -> Result<Option<String>, AuthStoreError> {
        let mut conn = self.pool.acquire().await?;
        let org = auth::org_for_api_key(key_hash, &mut conn).await?;
        Ok(org)
    }
}
