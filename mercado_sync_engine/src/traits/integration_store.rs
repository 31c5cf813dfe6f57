use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::Integration;

#[derive(Debug, Clone, Error)]
pub enum IntegrationStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for IntegrationStoreError {
    fn from(e: sqlx::Error) -> Self {
        IntegrationStoreError::DatabaseError(e.to_string())
    }
}

/// Storage for marketplace credential sets. There may be stale duplicate rows for an (organization,
/// marketplace) pair left behind by repeated OAuth connects; lookups always resolve to the most recently
/// issued row.
#[allow(async_fn_in_trait)]
pub trait IntegrationStore {
    async fn fetch_integration(&self, id: i64) -> Result<Option<Integration>, IntegrationStoreError>;

    /// Fetches the active integration for an organization on the given marketplace, i.e. the most recently
    /// created matching row.
    async fn fetch_active_integration(
        &self,
        organization_id: &str,
        marketplace: &str,
    ) -> Result<Option<Integration>, IntegrationStoreError>;

    /// Fetches the integration owning the given marketplace seller account.
    async fn fetch_integration_for_seller(
        &self,
        seller_external_id: &str,
    ) -> Result<Option<Integration>, IntegrationStoreError>;

    /// Persists freshly issued tokens. `external_account_id` only overwrites the stored value when the token
    /// response actually reported one.
    async fn update_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        external_account_id: Option<&str>,
    ) -> Result<Integration, IntegrationStoreError>;
}
