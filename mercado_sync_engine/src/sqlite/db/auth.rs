use sqlx::SqliteConnection;

pub async fn org_for_api_key(key_hash: &str, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let org: Option<String> = sqlx::query_scalar("SELECT organization_id FROM api_keys WHERE key_hash = $1")
        .bind(key_hash)
        .fetch_optional(conn)
        .await?;
    Ok(org)
}
