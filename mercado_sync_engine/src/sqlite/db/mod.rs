//! # SQLite database methods
//!
//! "Low-level" SQLite interactions. Everything here is a plain function that accepts a
//! `&mut SqliteConnection`, so callers can run them on a pooled connection or inside a transaction without
//! any other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod auth;
pub mod integrations;
pub mod orders;

const SQLITE_DB_URL: &str = "sqlite://data/msg_store.db";

pub fn db_url() -> String {
    let result = env::var("MSG_DATABASE_URL").unwrap_or_else(|_| {
        info!("MSG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Creates the schema if it does not exist yet. Idempotent, so it runs unconditionally on every pool open.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), SqlxError> {
    const SCHEMA: [&str; 5] = [
        r#"
        CREATE TABLE IF NOT EXISTS integrations (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id     TEXT NOT NULL,
            marketplace         TEXT NOT NULL,
            external_account_id TEXT,
            access_token        TEXT NOT NULL,
            refresh_token       TEXT NOT NULL,
            expires_at          TIMESTAMP NOT NULL,
            created_at          TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at          TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS integrations_org_marketplace
            ON integrations (organization_id, marketplace, created_at)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS marketplace_orders (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id TEXT NOT NULL,
            marketplace     TEXT NOT NULL,
            external_id     TEXT NOT NULL,
            status          TEXT NOT NULL,
            status_detail   TEXT,
            date_created    TIMESTAMP,
            last_updated    TIMESTAMP NOT NULL,
            buyer           TEXT NOT NULL DEFAULT 'null',
            seller          TEXT NOT NULL DEFAULT 'null',
            line_items      TEXT NOT NULL DEFAULT 'null',
            payments        TEXT NOT NULL DEFAULT 'null',
            shipments       TEXT NOT NULL DEFAULT 'null',
            raw             TEXT NOT NULL DEFAULT 'null',
            last_synced_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (organization_id, marketplace, external_id)
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS marketplace_orders_last_updated
            ON marketplace_orders (organization_id, marketplace, last_updated)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS api_keys (
            key_hash        TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ];
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}
