use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers::{parse_date, value_id};

/// Response of the marketplace's OAuth token endpoint for a `refresh_token` grant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Token lifetime in seconds, relative to the moment the response was issued.
    pub expires_in: i64,
    /// A new refresh token. MercadoLibre rotates refresh tokens on every grant, but the field is optional so a
    /// non-rotating provider does not break deserialization.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// The seller account the token belongs to.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct Paging {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
}

/// One page of `/orders/search` results. The order entries keep their raw upstream shape; use
/// [`OrderSummary::from_value`] to project the fields the sync engine needs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OrderSearchResults {
    #[serde(default)]
    pub paging: Paging,
    #[serde(default)]
    pub results: Vec<Value>,
}

/// The projection of a search result entry used for change detection.
#[derive(Debug, Clone)]
pub struct OrderSummary {
    pub id: String,
    pub last_updated: Option<DateTime<Utc>>,
}

impl OrderSummary {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value_id(&value["id"])?;
        let last_updated = parse_date(&value["last_updated"]).or_else(|| parse_date(&value["date_last_updated"]));
        Some(Self { id, last_updated })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn token_response_deserializes() {
        let body = json!({
            "access_token": "APP_USR-123-abc",
            "token_type": "Bearer",
            "expires_in": 21600,
            "scope": "offline_access read write",
            "user_id": 1234567,
            "refresh_token": "TG-456-def"
        });
        let token: TokenResponse = serde_json::from_value(body).unwrap();
        assert_eq!(token.access_token, "APP_USR-123-abc");
        assert_eq!(token.expires_in, 21600);
        assert_eq!(token.refresh_token.as_deref(), Some("TG-456-def"));
        assert_eq!(token.user_id, Some(1234567));
    }

    #[test]
    fn token_response_tolerates_missing_refresh_token() {
        let body = json!({ "access_token": "abc", "expires_in": 3600 });
        let token: TokenResponse = serde_json::from_value(body).unwrap();
        assert!(token.refresh_token.is_none());
        assert!(token.user_id.is_none());
    }

    #[test]
    fn search_results_project_to_summaries() {
        let body = json!({
            "paging": { "total": 2, "offset": 0, "limit": 50 },
            "results": [
                { "id": 2000001, "last_updated": "2024-05-01T10:00:00.000-00:00" },
                { "id": "2000002", "date_last_updated": "2024-05-01T09:00:00.000-00:00" },
                { "status": "paid" }
            ]
        });
        let page: OrderSearchResults = serde_json::from_value(body).unwrap();
        assert_eq!(page.paging.total, 2);
        let summaries = page.results.iter().filter_map(OrderSummary::from_value).collect::<Vec<_>>();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, "2000001");
        assert!(summaries[0].last_updated.is_some());
        assert_eq!(summaries[1].id, "2000002");
    }

    #[test]
    fn empty_search_page_deserializes() {
        let page: OrderSearchResults = serde_json::from_value(json!({})).unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.paging.total, 0);
    }
}
