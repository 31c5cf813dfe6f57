use meli_tools::{MeliApi, MeliApiError, OrderSearchResults, TokenResponse};
use msg_common::Secret;
use serde_json::Value;

/// The outbound marketplace seam. Mirrors the calls the sync engine and vault make against the MercadoLibre
/// REST API; [`MeliApi`] is the production implementation.
#[allow(async_fn_in_trait)]
pub trait MarketplaceClient {
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &Secret<String>,
        refresh_token: &str,
    ) -> Result<TokenResponse, MeliApiError>;

    async fn search_orders(
        &self,
        seller_id: &str,
        offset: u64,
        limit: u64,
        status: Option<&str>,
        token: &str,
    ) -> Result<OrderSearchResults, MeliApiError>;

    async fn get_order(&self, order_id: &str, token: &str) -> Result<Value, MeliApiError>;

    async fn get_payment(&self, payment_id: &str, token: &str) -> Result<Value, MeliApiError>;

    async fn get_shipment(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError>;

    async fn get_shipment_tracking(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError>;

    async fn get_shipment_costs(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError>;
}

impl MarketplaceClient for MeliApi {
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &Secret<String>,
        refresh_token: &str,
    ) -> Result<TokenResponse, MeliApiError> {
        MeliApi::refresh_token(self, client_id, client_secret, refresh_token).await
    }

    async fn search_orders(
        &self,
        seller_id: &str,
        offset: u64,
        limit: u64,
        status: Option<&str>,
        token: &str,
    ) -> Result<OrderSearchResults, MeliApiError> {
        MeliApi::search_orders(self, seller_id, offset, limit, status, token).await
    }

    async fn get_order(&self, order_id: &str, token: &str) -> Result<Value, MeliApiError> {
        MeliApi::get_order(self, order_id, token).await
    }

    async fn get_payment(&self, payment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        MeliApi::get_payment(self, payment_id, token).await
    }

    async fn get_shipment(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        MeliApi::get_shipment(self, shipment_id, token).await
    }

    async fn get_shipment_tracking(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        MeliApi::get_shipment_tracking(self, shipment_id, token).await
    }

    async fn get_shipment_costs(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        MeliApi::get_shipment_costs(self, shipment_id, token).await
    }
}
