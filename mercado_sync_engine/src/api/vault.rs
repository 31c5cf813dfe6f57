//! The credential vault.
//!
//! [`CredentialVaultApi`] is the only component that reads or writes OAuth tokens. Tokens live encrypted in the
//! integration row; the vault decrypts on demand, refreshes expired tokens against the marketplace token
//! endpoint, and persists the rotated pair before handing the plaintext access token to the caller.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use msg_common::Secret;
use thiserror::Error;

use crate::{
    crypto::{CryptoError, VaultKey},
    db_types::Integration,
    traits::{IntegrationStore, IntegrationStoreError, MarketplaceClient},
};

/// The only marketplace this backend talks to today.
pub const MARKETPLACE: &str = "mercadolibre";

/// Tokens this close to expiry are treated as expired, so a token handed out is never stale by the time the
/// caller's request reaches the marketplace.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Integration {0} does not exist")]
    IntegrationNotFound(i64),
    #[error("Storage error in the credential vault. {0}")]
    StorageError(#[from] IntegrationStoreError),
    #[error("Token cipher error. {0}")]
    CryptoError(#[from] CryptoError),
    #[error("Could not refresh the token for integration {id}. {reason}")]
    RefreshFailure { id: i64, reason: String },
}

/// The OAuth application credentials issued by the marketplace developer console. Shared by every integration;
/// the per-seller state is the refresh token in the integration row.
#[derive(Debug, Clone)]
pub struct MarketplaceAppCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
}

#[derive(Clone)]
pub struct CredentialVaultApi<B, C> {
    db: B,
    client: C,
    key: Arc<VaultKey>,
    app: MarketplaceAppCredentials,
    /// One async mutex per integration id. Concurrent callers that find an expired token serialize here, so
    /// only the winner hits the token endpoint; the losers re-read the row and find the fresh token.
    locks: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl<B, C> CredentialVaultApi<B, C>
where
    B: IntegrationStore,
    C: MarketplaceClient,
{
    pub fn new(db: B, client: C, key: VaultKey, app: MarketplaceAppCredentials) -> Self {
        Self { db, client, key: Arc::new(key), app, locks: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Returns a plaintext access token for the integration, refreshing it first if it has expired (or is
    /// about to). This is the hot path for every outbound marketplace call.
    pub async fn get_valid_access_token(&self, integration_id: i64) -> Result<String, VaultError> {
        let integration = self.fetch(integration_id).await?;
        if is_fresh(&integration) {
            return Ok(self.key.decrypt(&integration.access_token)?);
        }
        let lock = self.lock_for(integration_id);
        let _guard = lock.lock().await;
        // A racing caller may have refreshed while we waited for the lock.
        let integration = self.fetch(integration_id).await?;
        if is_fresh(&integration) {
            debug!("🔐️ Integration {integration_id} was refreshed by a concurrent caller");
            return Ok(self.key.decrypt(&integration.access_token)?);
        }
        self.refresh_locked(integration).await
    }

    /// Refreshes the token unconditionally, regardless of its expiry. Used after the marketplace rejects a
    /// token that looked valid on paper (revoked, or clock skew beyond our margin).
    pub async fn refresh_now(&self, integration_id: i64) -> Result<String, VaultError> {
        let lock = self.lock_for(integration_id);
        let _guard = lock.lock().await;
        let integration = self.fetch(integration_id).await?;
        self.refresh_locked(integration).await
    }

    async fn fetch(&self, integration_id: i64) -> Result<Integration, VaultError> {
        self.db
            .fetch_integration(integration_id)
            .await?
            .ok_or(VaultError::IntegrationNotFound(integration_id))
    }

    /// Performs the actual refresh grant. Callers must hold the integration's lock.
    async fn refresh_locked(&self, integration: Integration) -> Result<String, VaultError> {
        let id = integration.id;
        let refresh_plain = self.key.decrypt(&integration.refresh_token)?;
        info!("🔐️ Refreshing the access token for integration {id}");
        let response = self
            .client
            .refresh_token(&self.app.client_id, &self.app.client_secret, &refresh_plain)
            .await
            .map_err(|e| {
                warn!("🔐️ Token refresh for integration {id} failed: {e}");
                VaultError::RefreshFailure { id, reason: e.to_string() }
            })?;
        let expires_at = Utc::now() + Duration::seconds(response.expires_in);
        // MercadoLibre rotates the refresh token on every grant. If a provider ever omits it, the old one
        // stays valid, so keep it (re-sealed under a fresh nonce).
        let new_refresh = response.refresh_token.as_deref().unwrap_or(&refresh_plain);
        let sealed_access = self.key.encrypt(&response.access_token)?;
        let sealed_refresh = self.key.encrypt(new_refresh)?;
        let account = response.user_id.map(|uid| uid.to_string());
        self.db.update_tokens(id, &sealed_access, &sealed_refresh, expires_at, account.as_deref()).await?;
        info!("🔐️ Integration {id} refreshed. The new token expires at {expires_at}");
        Ok(response.access_token)
    }

    fn lock_for(&self, integration_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(integration_id).or_default())
    }
}

fn is_fresh(integration: &Integration) -> bool {
    integration.expires_at > Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS)
}
