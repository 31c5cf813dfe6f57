use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuthStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AuthStoreError {
    fn from(e: sqlx::Error) -> Self {
        AuthStoreError::DatabaseError(e.to_string())
    }
}

/// Resolves caller credentials for the manual sync endpoint. Keys are stored hashed; the caller presents the
/// raw key and the HTTP layer hashes it before the lookup.
#[allow(async_fn_in_trait)]
pub trait AuthStore {
    /// The organization the hashed API key belongs to, or `None` for an unknown key.
    async fn org_for_api_key(&self, key_hash: &str) -> Result<Option<String>, AuthStoreError>;
}
