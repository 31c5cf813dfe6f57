use std::time::Duration;

use log::*;

pub const DEFAULT_API_BASE: &str = "https://api.mercadolibre.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct MeliConfig {
    /// Base url for the MercadoLibre REST API, without a trailing slash.
    pub api_base: String,
    /// Per-request timeout applied to every call the client makes.
    pub timeout: Duration,
}

impl Default for MeliConfig {
    fn default() -> Self {
        Self { api_base: DEFAULT_API_BASE.to_string(), timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS) }
    }
}

impl MeliConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_base = std::env::var("MSG_MELI_API_URL").unwrap_or_else(|_| {
            info!("MSG_MELI_API_URL not set, using {DEFAULT_API_BASE}");
            DEFAULT_API_BASE.to_string()
        });
        let api_base = api_base.trim_end_matches('/').to_string();
        let timeout = std::env::var("MSG_MELI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("Invalid value for MSG_MELI_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { api_base, timeout }
    }
}
