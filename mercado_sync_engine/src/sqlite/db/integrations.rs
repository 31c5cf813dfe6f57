use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::Integration, traits::IntegrationStoreError};

pub async fn fetch_integration(id: i64, conn: &mut SqliteConnection) -> Result<Option<Integration>, sqlx::Error> {
    let integration =
        sqlx::query_as("SELECT * FROM integrations WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(integration)
}

/// Returns the most recently issued integration for the (organization, marketplace) pair. Duplicate rows can
/// exist after repeated OAuth connects; the newest one is authoritative.
pub async fn fetch_active_integration(
    organization_id: &str,
    marketplace: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Integration>, sqlx::Error> {
    let integration = sqlx::query_as(
        "SELECT * FROM integrations WHERE organization_id = $1 AND marketplace = $2 ORDER BY created_at DESC, id \
         DESC LIMIT 1",
    )
    .bind(organization_id)
    .bind(marketplace)
    .fetch_optional(conn)
    .await?;
    Ok(integration)
}

pub async fn fetch_integration_for_seller(
    seller_external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Integration>, sqlx::Error> {
    let integration = sqlx::query_as(
        "SELECT * FROM integrations WHERE external_account_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(seller_external_id)
    .fetch_optional(conn)
    .await?;
    Ok(integration)
}

/// Persists freshly issued tokens. The external account id is only overwritten when the refresh response
/// reported one, otherwise the stored value is kept.
pub async fn update_tokens(
    id: i64,
    access_token: &str,
    refresh_token: &str,
    expires_at: DateTime<Utc>,
    external_account_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Integration, IntegrationStoreError> {
    let updated: Option<Integration> = sqlx::query_as(
        r#"
        UPDATE integrations SET
            access_token = $1,
            refresh_token = $2,
            expires_at = $3,
            external_account_id = COALESCE($4, external_account_id),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .bind(external_account_id)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    debug!("📝️ Tokens updated for integration {id}");
    updated.ok_or_else(|| IntegrationStoreError::DatabaseError(format!("integration {id} vanished during update")))
}
