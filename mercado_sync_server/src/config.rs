use std::env;

use log::*;
use mercado_sync_engine::{crypto::VaultKey, MarketplaceAppCredentials};
use msg_common::Secret;
use rand::RngCore;

const DEFAULT_MSG_HOST: &str = "127.0.0.1";
const DEFAULT_MSG_PORT: u16 = 8460;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The AES-256-GCM master key under which OAuth tokens are sealed at rest.
    pub vault_key: VaultKey,
    /// The MercadoLibre application credentials used for every token refresh grant.
    pub meli_credentials: MarketplaceAppCredentials,
    pub auth: AuthConfig,
    pub webhook: WebhookConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MSG_HOST.to_string(),
            port: DEFAULT_MSG_PORT,
            database_url: String::default(),
            vault_key: VaultKey::random(),
            meli_credentials: MarketplaceAppCredentials {
                client_id: String::default(),
                client_secret: Secret::default(),
            },
            auth: AuthConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MSG_HOST").ok().unwrap_or_else(|| DEFAULT_MSG_HOST.into());
        let port = env::var("MSG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MSG_PORT. {e} Using the default, {DEFAULT_MSG_PORT}, instead."
                    );
                    DEFAULT_MSG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MSG_PORT);
        let database_url = env::var("MSG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MSG_DATABASE_URL is not set. Please set it to the URL for the order store database.");
            String::default()
        });
        let vault_key = configure_vault_key();
        let meli_credentials = configure_meli_credentials();
        let auth = AuthConfig::from_env_or_default();
        let webhook = WebhookConfig::from_env_or_default();
        Self { host, port, database_url, vault_key, meli_credentials, auth, webhook }
    }
}

fn configure_vault_key() -> VaultKey {
    match env::var("MSG_VAULT_KEY") {
        Ok(hex) => VaultKey::from_hex(&hex).unwrap_or_else(|e| {
            warn!(
                "🚨️🚨️🚨️ MSG_VAULT_KEY is set but invalid ({e}). Using a random key for this session. Tokens \
                 encrypted now will NOT be readable after a restart. 🚨️🚨️🚨️"
            );
            VaultKey::random()
        }),
        Err(_) => {
            warn!(
                "🚨️🚨️🚨️ MSG_VAULT_KEY is not set. I'm using a random key for this session. DO NOT operate on \
                 production like this, since every stored token becomes unreadable when the server restarts. \
                 🚨️🚨️🚨️"
            );
            VaultKey::random()
        },
    }
}

fn configure_meli_credentials() -> MarketplaceAppCredentials {
    let client_id = env::var("MSG_MELI_CLIENT_ID").ok().unwrap_or_else(|| {
        error!("🪛️ MSG_MELI_CLIENT_ID is not set. Token refreshes against MercadoLibre will fail.");
        String::default()
    });
    let client_secret = env::var("MSG_MELI_CLIENT_SECRET").ok().unwrap_or_else(|| {
        error!("🪛️ MSG_MELI_CLIENT_SECRET is not set. Token refreshes against MercadoLibre will fail.");
        String::default()
    });
    MarketplaceAppCredentials { client_id, client_secret: Secret::new(client_secret) }
}

/// Settings for authenticating callers of the manual sync endpoint.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Shared secret presented in `x-internal-secret` by trusted internal services.
    pub internal_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️ MSG_INTERNAL_SECRET is not set. A random value is used for this session, so internal service \
             calls will be rejected until it is configured."
        );
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { internal_secret: Secret::new(hex::encode(bytes)) }
    }
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        match env::var("MSG_INTERNAL_SECRET") {
            Ok(secret) => Self { internal_secret: Secret::new(secret) },
            Err(_) => Self::default(),
        }
    }
}

/// Settings for the webhook signature check.
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_secret = env::var("MSG_WEBHOOK_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ MSG_WEBHOOK_HMAC_SECRET is not set. Please set it to the webhook signing key.");
            String::default()
        });
        let hmac_checks = env::var("MSG_WEBHOOK_HMAC_CHECKS").map(|s| &s != "0" && &s != "false").unwrap_or(true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are disabled. Anyone can post to the webhook endpoint.");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}
