use meli_tools::helpers::value_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every topic the webhook endpoint acknowledges. Notifications for other topics are answered with 200 but
/// marked as not accepted, so the marketplace does not retry them.
pub const SUPPORTED_TOPICS: [&str; 6] =
    ["orders", "orders_v2", "items", "shipments", "stock_locations", "available_quantity"];

/// An incoming MercadoLibre webhook notification.
///
/// The underscore-prefixed fields are not part of the upstream payload: they are stamped onto the synthetic
/// notification created when a shipment notification is rerouted to its order, so consumers of the logs can
/// trace where a sync came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub topic: Option<String>,
    pub resource: Option<String>,
    /// The marketplace seller account the notification is for. Numeric upstream.
    pub user_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
    #[serde(rename = "_forwarded_from", default, skip_serializing_if = "Option::is_none")]
    pub forwarded_from: Option<String>,
    #[serde(rename = "_shipment_id", default, skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<String>,
    #[serde(rename = "_original", default, skip_serializing_if = "Option::is_none")]
    pub original: Option<Box<Value>>,
}

impl WebhookNotification {
    pub fn seller_id(&self) -> Option<String> {
        self.user_id.as_ref().and_then(value_id)
    }
}

/// Body of a `POST /api/sync` request. All fields are optional; an empty body runs a plain incremental sync
/// for the caller's organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Required for internal service calls (unless `seller_id` is given); optional (and cross-checked) for
    /// API key calls.
    #[serde(default, alias = "organizationId")]
    pub organization_id: Option<String>,
    /// Selects the integration by its marketplace seller account instead of by organization.
    #[serde(default)]
    pub seller_id: Option<String>,
    /// Ignore the watermark and walk the whole paging window.
    #[serde(default)]
    pub full: bool,
    /// Sync exactly these orders instead of scanning the feed.
    #[serde(default)]
    pub order_ids: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self { success: false, message: message.into() }
    }
}
