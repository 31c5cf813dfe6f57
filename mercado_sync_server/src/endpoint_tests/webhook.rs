use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use actix_web::{http::header::ContentType, http::StatusCode, test, test::TestRequest, App};
use chrono::{DateTime, Utc};
use log::info;
use mercado_sync_engine::{
    db_types::{Integration, NewOrderRecord, OrderRecord, UpsertOutcome},
    test_utils::mocks::{MockMarketplace, MockStorage, SharedMarketplace, SharedStorage},
    traits::{
        AuthStore,
        AuthStoreError,
        IntegrationStore,
        IntegrationStoreError,
        OrderStore,
        OrderStoreError,
    },
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use super::helpers::{configure_app_with, send_guarded_request, send_request, test_integration, WEBHOOK_SECRET};
use crate::helpers::calculate_hmac;

fn order_payload(id: &str) -> Value {
    json!({
        "id": id,
        "status": "paid",
        "date_created": "2024-05-01T10:00:00.000-00:00",
        "last_updated": "2024-05-02T11:30:00.000-00:00",
        "buyer": { "id": 9 },
        "seller": { "id": 111 },
        "order_items": [],
        "payments": [],
    })
}

/// Storage wrapper whose `upsert_order` waits for the test to open a gate. The write deadlocks unless the
/// HTTP response has already been produced, so the ack-timing test fails against any implementation that
/// runs the sync inline before responding.
#[derive(Clone)]
struct GatedStorage {
    inner: SharedStorage,
    gate: Arc<tokio::sync::Mutex<Option<oneshot::Receiver<()>>>>,
}

impl GatedStorage {
    fn new(inner: SharedStorage, gate: oneshot::Receiver<()>) -> Self {
        Self { inner, gate: Arc::new(tokio::sync::Mutex::new(Some(gate))) }
    }
}

impl IntegrationStore for GatedStorage {
    async fn fetch_integration(&self, id: i64) -> Result<Option<Integration>, IntegrationStoreError> {
        self.inner.fetch_integration(id).await
    }

    async fn fetch_active_integration(
        &self,
        organization_id: &str,
        marketplace: &str,
    ) -> Result<Option<Integration>, IntegrationStoreError> {
        self.inner.fetch_active_integration(organization_id, marketplace).await
    }

    async fn fetch_integration_for_seller(
        &self,
        seller_external_id: &str,
    ) -> Result<Option<Integration>, IntegrationStoreError> {
        self.inner.fetch_integration_for_seller(seller_external_id).await
    }

    async fn update_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        external_account_id: Option<&str>,
    ) -> Result<Integration, IntegrationStoreError> {
        self.inner.update_tokens(id, access_token, refresh_token, expires_at, external_account_id).await
    }
}

impl OrderStore for GatedStorage {
    async fn last_update_watermark(
        &self,
        organization_id: &str,
        marketplace: &str,
    ) -> Result<Option<DateTime<Utc>>, OrderStoreError> {
        self.inner.last_update_watermark(organization_id, marketplace).await
    }

    async fn fetch_order_stamp(
        &self,
        organization_id: &str,
        marketplace: &str,
        external_id: &str,
    ) -> Result<Option<DateTime<Utc>>, OrderStoreError> {
        self.inner.fetch_order_stamp(organization_id, marketplace, external_id).await
    }

    async fn fetch_order(
        &self,
        organization_id: &str,
        marketplace: &str,
        external_id: &str,
    ) -> Result<Option<OrderRecord>, OrderStoreError> {
        self.inner.fetch_order(organization_id, marketplace, external_id).await
    }

    async fn upsert_order(&self, record: &NewOrderRecord) -> Result<UpsertOutcome, OrderStoreError> {
        if let Some(rx) = self.gate.lock().await.take() {
            tokio::time::timeout(std::time::Duration::from_secs(2), rx)
                .await
                .expect("the order sync ran before the ack went out")
                .ok();
        }
        self.inner.upsert_order(record).await
    }
}

impl AuthStore for GatedStorage {
    async fn org_for_api_key(&self, key_hash: &str) -> Result<Option<String>, AuthStoreError> {
        self.inner.org_for_api_key(key_hash).await
    }
}

#[actix_web::test]
async fn notifications_without_required_fields_are_rejected() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/webhook").set_json(json!({ "topic": "orders" }));
    let (status, body) = send_request(req, MockStorage::new(), MockMarketplace::new()).await;
    info!("Response body: {body}");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("topic, resource and user_id are required"), "was: {body}");
}

#[actix_web::test]
async fn unsupported_topics_are_acknowledged_but_not_accepted() {
    let _ = env_logger::try_init().ok();
    let note = json!({ "topic": "payments", "resource": "/payments/1", "user_id": 111 });
    let req = TestRequest::post().uri("/webhook").set_json(note);
    // No expectations anywhere: an unsupported topic must not reach storage or the marketplace.
    let (status, body) = send_request(req, MockStorage::new(), MockMarketplace::new()).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["accepted"], json!(false));
    assert!(body["supported_topics"].as_array().unwrap().contains(&json!("orders")));
}

#[actix_web::test]
async fn order_notifications_are_acked_first_and_synced_in_the_background() {
    let _ = env_logger::try_init().ok();
    let synced = Arc::new(AtomicBool::new(false));
    let row = test_integration();
    let mut db = MockStorage::new();
    let row2 = row.clone();
    db.expect_fetch_integration().returning(move |_| Ok(Some(row2.clone())));
    db.expect_fetch_integration_for_seller().returning(move |_| Ok(Some(row.clone())));
    let flag = Arc::clone(&synced);
    db.expect_upsert_order().times(1).returning(move |record| {
        assert_eq!(record.external_id, "2000003508419500");
        flag.store(true, Ordering::SeqCst);
        Ok(UpsertOutcome::Created)
    });
    let mut client = MockMarketplace::new();
    client.expect_get_order().times(1).returning(|id, _| Ok(order_payload(id)));
    // The order write blocks on this gate, which only opens after the ack has been asserted.
    let (open_gate, gate) = oneshot::channel();
    let storage = GatedStorage::new(SharedStorage::new(db), gate);
    let app = App::new().configure(configure_app_with(storage, SharedMarketplace::new(client)));
    let app = test::init_service(app).await;
    let note = json!({ "topic": "orders_v2", "resource": "/orders/2000003508419500", "user_id": 111 });
    let req = TestRequest::post().uri("/webhook").set_json(note).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["accepted"], json!(true));
    assert_eq!(body["topic"], json!("orders_v2"));
    assert!(body["correlation_id"].as_str().map(|s| !s.is_empty()).unwrap_or(false));
    // The ack went out while the write was still gated. Open the gate and check the sync completes.
    open_gate.send(()).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(synced.load(Ordering::SeqCst), "background dispatch never ran");
}

#[actix_web::test]
async fn shipment_notifications_are_forwarded_to_their_order() {
    let _ = env_logger::try_init().ok();
    let synced = Arc::new(AtomicBool::new(false));
    let row = test_integration();
    let mut db = MockStorage::new();
    let row2 = row.clone();
    db.expect_fetch_integration().returning(move |_| Ok(Some(row2.clone())));
    db.expect_fetch_integration_for_seller().returning(move |_| Ok(Some(row.clone())));
    let flag = Arc::clone(&synced);
    db.expect_upsert_order().times(1).returning(move |record| {
        assert_eq!(record.external_id, "2000001");
        flag.store(true, Ordering::SeqCst);
        Ok(UpsertOutcome::Updated)
    });
    let mut client = MockMarketplace::new();
    client
        .expect_get_shipment()
        .times(1)
        .returning(|id, _| Ok(json!({ "id": id, "order_id": 2000001, "status": "shipped" })));
    client.expect_get_order().times(1).returning(|id, _| {
        assert_eq!(id, "2000001");
        Ok(order_payload(id))
    });
    let note = json!({ "topic": "shipments", "resource": "/shipments/43096727653", "user_id": 111 });
    let req = TestRequest::post().uri("/webhook").set_json(note);
    let (status, body) = send_request(req, db, client).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["accepted"], json!(true));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(synced.load(Ordering::SeqCst), "shipment was never rerouted to its order");
}

#[actix_web::test]
async fn notifications_for_unknown_sellers_are_still_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut db = MockStorage::new();
    db.expect_fetch_integration_for_seller().returning(|_| Ok(None));
    let note = json!({ "topic": "orders", "resource": "/orders/2000001", "user_id": 999 });
    let req = TestRequest::post().uri("/webhook").set_json(note);
    let (status, body) = send_request(req, db, MockMarketplace::new()).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["accepted"], json!(true));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

fn signed_webhook_request(body: &Value) -> TestRequest {
    let raw = serde_json::to_vec(body).unwrap();
    let signature = calculate_hmac(WEBHOOK_SECRET, &raw);
    TestRequest::post()
        .uri("/meli/webhook")
        .insert_header(ContentType::json())
        .insert_header(("X-Signature", signature))
        .set_payload(raw)
}

#[actix_web::test]
async fn correctly_signed_notifications_are_accepted() {
    let _ = env_logger::try_init().ok();
    let mut db = MockStorage::new();
    db.expect_fetch_integration_for_seller().returning(|_| Ok(None));
    let note = json!({ "topic": "orders", "resource": "/orders/2000001", "user_id": 999 });
    let req = signed_webhook_request(&note);
    let (status, body) = send_guarded_request(req, db, MockMarketplace::new(), true).await;
    assert_eq!(status, StatusCode::OK);
    // The handler saw the re-injected body intact, not just a 200 from the middleware.
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["accepted"], json!(true));
    assert_eq!(body["topic"], json!("orders"));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

#[actix_web::test]
async fn unsigned_notifications_are_rejected() {
    let _ = env_logger::try_init().ok();
    let note = json!({ "topic": "orders", "resource": "/orders/2000001", "user_id": 111 });
    let req = TestRequest::post().uri("/meli/webhook").set_json(note);
    // No expectations: a request without a signature must never reach the handler.
    let (status, body) = send_guarded_request(req, MockStorage::new(), MockMarketplace::new(), true).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("signature header is missing"), "was: {body}");
}

#[actix_web::test]
async fn tampered_notifications_are_rejected() {
    let _ = env_logger::try_init().ok();
    let note = json!({ "topic": "orders", "resource": "/orders/2000001", "user_id": 111 });
    let raw = serde_json::to_vec(&json!({ "topic": "orders", "resource": "/orders/9999999", "user_id": 111 })).unwrap();
    let signature = calculate_hmac(WEBHOOK_SECRET, &raw);
    let req = TestRequest::post()
        .uri("/meli/webhook")
        .insert_header(ContentType::json())
        .insert_header(("X-Signature", signature))
        .set_json(note);
    let (status, body) = send_guarded_request(req, MockStorage::new(), MockMarketplace::new(), true).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("does not match"), "was: {body}");
}

#[actix_web::test]
async fn signature_checks_can_be_disabled() {
    let _ = env_logger::try_init().ok();
    let note = json!({ "topic": "payments", "resource": "/payments/1", "user_id": 111 });
    let req = TestRequest::post().uri("/meli/webhook").set_json(note);
    let (status, body) = send_guarded_request(req, MockStorage::new(), MockMarketplace::new(), false).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["accepted"], json!(false));
}
