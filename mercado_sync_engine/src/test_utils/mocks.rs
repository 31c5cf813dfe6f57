//! `mockall` doubles for [`crate::traits`].
//!
//! `MockStorage` and `MockMarketplace` are plain mockall mocks; use them directly where no `Clone` bound is in
//! play. [`OrderSyncApi`](crate::OrderSyncApi) needs cloneable backends, so [`SharedStorage`] and
//! [`SharedMarketplace`] wrap a mock in an `Arc` and delegate. Set all expectations before wrapping.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use meli_tools::{MeliApiError, OrderSearchResults, TokenResponse};
use mockall::mock;
use msg_common::Secret;
use serde_json::Value;

use crate::{
    db_types::{Integration, NewOrderRecord, OrderRecord, UpsertOutcome},
    traits::{
        AuthStore,
        AuthStoreError,
        IntegrationStore,
        IntegrationStoreError,
        MarketplaceClient,
        OrderStore,
        OrderStoreError,
    },
};

mock! {
    pub Storage {}

    impl IntegrationStore for Storage {
        async fn fetch_integration(&self, id: i64) -> Result<Option<Integration>, IntegrationStoreError>;
        async fn fetch_active_integration(
            &self,
            organization_id: &str,
            marketplace: &str,
        ) -> Result<Option<Integration>, IntegrationStoreError>;
        async fn fetch_integration_for_seller(
            &self,
            seller_external_id: &str,
        ) -> Result<Option<Integration>, IntegrationStoreError>;
        async fn update_tokens<'a>(
            &self,
            id: i64,
            access_token: &str,
            refresh_token: &str,
            expires_at: DateTime<Utc>,
            external_account_id: Option<&'a str>,
        ) -> Result<Integration, IntegrationStoreError>;
    }

    impl OrderStore for Storage {
        async fn last_update_watermark(
            &self,
            organization_id: &str,
            marketplace: &str,
        ) -> Result<Option<DateTime<Utc>>, OrderStoreError>;
        async fn fetch_order_stamp(
            &self,
            organization_id: &str,
            marketplace: &str,
            external_id: &str,
        ) -> Result<Option<DateTime<Utc>>, OrderStoreError>;
        async fn fetch_order(
            &self,
            organization_id: &str,
            marketplace: &str,
            external_id: &str,
        ) -> Result<Option<OrderRecord>, OrderStoreError>;
        async fn upsert_order(&self, record: &NewOrderRecord) -> Result<UpsertOutcome, OrderStoreError>;
    }

    impl AuthStore for Storage {
        async fn org_for_api_key(&self, key_hash: &str) -> Result<Option<String>, AuthStoreError>;
    }
}

mock! {
    pub Marketplace {}

    impl MarketplaceClient for Marketplace {
        async fn refresh_token(
            &self,
            client_id: &str,
            client_secret: &Secret<String>,
            refresh_token: &str,
        ) -> Result<TokenResponse, MeliApiError>;
        async fn search_orders<'a>(
            &self,
            seller_id: &str,
            offset: u64,
            limit: u64,
            status: Option<&'a str>,
            token: &str,
        ) -> Result<OrderSearchResults, MeliApiError>;
        async fn get_order(&self, order_id: &str, token: &str) -> Result<Value, MeliApiError>;
        async fn get_payment(&self, payment_id: &str, token: &str) -> Result<Value, MeliApiError>;
        async fn get_shipment(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError>;
        async fn get_shipment_tracking(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError>;
        async fn get_shipment_costs(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError>;
    }
}

#[derive(Clone)]
pub struct SharedStorage(Arc<MockStorage>);

impl SharedStorage {
    pub fn new(mock: MockStorage) -> Self {
        Self(Arc::new(mock))
    }
}

impl IntegrationStore for SharedStorage {
    async fn fetch_integration(&self, id: i64) -> Result<Option<Integration>, IntegrationStoreError> {
        self.0.fetch_integration(id).await
    }

    async fn fetch_active_integration(
        &self,
        organization_id: &str,
        marketplace: &str,
    ) -> Result<Option<Integration>, IntegrationStoreError> {
        self.0.fetch_active_integration(organization_id, marketplace).await
    }

    async fn fetch_integration_for_seller(
        &self,
        seller_external_id: &str,
    ) -> Result<Option<Integration>, IntegrationStoreError> {
        self.0.fetch_integration_for_seller(seller_external_id).await
    }

    async fn update_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        external_account_id: Option<&str>,
    ) -> Result<Integration, IntegrationStoreError> {
        self.0.update_tokens(id, access_token, refresh_token, expires_at, external_account_id).await
    }
}

impl OrderStore for SharedStorage {
    async fn last_update_watermark(
        &self,
        organization_id: &str,
        marketplace: &str,
    ) -> Result<Option<DateTime<Utc>>, OrderStoreError> {
        self.0.last_update_watermark(organization_id, marketplace).await
    }

    async fn fetch_order_stamp(
        &self,
        organization_id: &str,
        marketplace: &str,
        external_id: &str,
    ) -> Result<Option<DateTime<Utc>>, OrderStoreError> {
        self.0.fetch_order_stamp(organization_id, marketplace, external_id).await
    }

    async fn fetch_order(
        &self,
        organization_id: &str,
        marketplace: &str,
        external_id: &str,
    ) -> Result<Option<OrderRecord>, OrderStoreError> {
        self.0.fetch_order(organization_id, marketplace, external_id).await
    }

    async fn upsert_order(&self, record: &NewOrderRecord) -> Result<UpsertOutcome, OrderStoreError> {
        self.0.upsert_order(record).await
    }
}

impl AuthStore for SharedStorage {
    async fn org_for_api_key(&self, key_hash: &str) -> Result<Option<String>, AuthStoreError> {
        self.0.org_for_api_key(key_hash).await
    }
}

#[derive(Clone)]
pub struct SharedMarketplace(Arc<MockMarketplace>);

impl SharedMarketplace {
    pub fn new(mock: MockMarketplace) -> Self {
        Self(Arc::new(mock))
    }
}

impl MarketplaceClient for SharedMarketplace {
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &Secret<String>,
        refresh_token: &str,
    ) -> Result<TokenResponse, MeliApiError> {
        self.0.refresh_token(client_id, client_secret, refresh_token).await
    }

    async fn search_orders(
        &self,
        seller_id: &str,
        offset: u64,
        limit: u64,
        status: Option<&str>,
        token: &str,
    ) -> Result<OrderSearchResults, MeliApiError> {
        self.0.search_orders(seller_id, offset, limit, status, token).await
    }

    async fn get_order(&self, order_id: &str, token: &str) -> Result<Value, MeliApiError> {
        self.0.get_order(order_id, token).await
    }

    async fn get_payment(&self, payment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        self.0.get_payment(payment_id, token).await
    }

    async fn get_shipment(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        self.0.get_shipment(shipment_id, token).await
    }

    async fn get_shipment_tracking(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        self.0.get_shipment_tracking(shipment_id, token).await
    }

    async fn get_shipment_costs(&self, shipment_id: &str, token: &str) -> Result<Value, MeliApiError> {
        self.0.get_shipment_costs(shipment_id, token).await
    }
}
