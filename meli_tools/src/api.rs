use std::sync::Arc;

use log::*;
use msg_common::Secret;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{config::MeliConfig, data_objects::OrderSearchResults, MeliApiError, TokenResponse};

/// A thin client over the MercadoLibre REST API. Every call is a single request/response round trip; token
/// refresh orchestration and retry policy live with the caller.
#[derive(Clone)]
pub struct MeliApi {
    config: MeliConfig,
    client: Arc<Client>,
}

impl MeliApi {
    pub fn new(config: MeliConfig) -> Result<Self, MeliApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MeliApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<B>,
        token: Option<&str>,
    ) -> Result<T, MeliApiError> {
        let url = self.url(path);
        trace!("🛒️ Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| MeliApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🛒️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| MeliApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| MeliApiError::RestResponseError(e.to_string()))?;
            Err(MeliApiError::QueryError { status, message })
        }
    }

    /// Exchanges a refresh token for a fresh access token via `POST /oauth/token`.
    pub async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &Secret<String>,
        refresh_token: &str,
    ) -> Result<TokenResponse, MeliApiError> {
        let body = serde_json::json!({
            "grant_type": "refresh_token",
            "client_id": client_id,
            "client_secret": client_secret.reveal(),
            "refresh_token": refresh_token,
        });
        debug!("🛒️ Requesting token refresh for client {client_id}");
        let result = self.rest_query::<TokenResponse, Value>(Method::POST, "/oauth/token", &[], Some(body), None).await?;
        info!("🛒️ Token refresh granted. New token expires in {}s", result.expires_in);
        Ok(result)
    }

    /// Lists the seller's orders, newest first. `offset`/`limit` drive pagination; the response reports the
    /// total so callers know when they have seen everything.
    pub async fn search_orders(
        &self,
        seller_id: &str,
        offset: u64,
        limit: u64,
        status: Option<&str>,
        token: &str,
    ) -> Result<OrderSearchResults, MeliApiError> {
        let mut params = vec![
            ("seller", seller_id.to_string()),
            ("sort", "date_desc".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(status) = status {
            params.push(("order.status", status.to_string()));
        }
        debug!("🛒️ Searching orders for seller {seller_id} (offset {offset}, limit {limit})");
        let result =
            self.rest_query::<OrderSearchResults, ()>(Method::GET, "/orders/search", &params, None, Some(token)).await?;
        debug!("🛒️ Fetched {} of {} orders", result.results.len(), result.paging.total);
        Ok(result)
    }

    pub async fn get_order(&self, order_id: &str, token: &str) -> Result<Value, MeliApiError> {
        let path = format!("/orders/{order_id}");
        debug!("🛒️ Fetching order #{order_id}");
        self.rest_query::<Value, ()>(Method::GET, &path, &[], None, Some(token)).await
    }

    /// Fetches the billing/charge breakdown for a payment.
    pub async fn get_payment(&self, payment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        let path = format!("/payments/{payment_id}");
        debug!("🛒️ Fetching payment #{payment_id}");
        self.rest_query::<Value, ()>(Method::GET, &path, &[], None, Some(token)).await
    }

    pub async fn get_shipment(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        let path = format!("/shipments/{shipment_id}");
        debug!("🛒️ Fetching shipment #{shipment_id}");
        self.rest_query::<Value, ()>(Method::GET, &path, &[], None, Some(token)).await
    }

    pub async fn get_shipment_tracking(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        let path = format!("/shipments/{shipment_id}/tracking");
        self.rest_query::<Value, ()>(Method::GET, &path, &[], None, Some(token)).await
    }

    pub async fn get_shipment_costs(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        let path = format!("/shipments/{shipment_id}/costs");
        self.rest_query::<Value, ()>(Method::GET, &path, &[], None, Some(token)).await
    }
}
