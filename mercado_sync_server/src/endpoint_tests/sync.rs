use actix_web::{http::StatusCode, test::TestRequest};
use log::info;
use mercado_sync_engine::{
    db_types::UpsertOutcome,
    test_utils::mocks::{MockMarketplace, MockStorage},
};
use serde_json::{json, Value};

use super::helpers::{send_request, test_integration, INTERNAL_SECRET};
use crate::helpers::sha256_hex;

fn empty_page() -> meli_tools::OrderSearchResults {
    serde_json::from_value(json!({ "paging": { "total": 0, "offset": 0, "limit": 50 }, "results": [] })).unwrap()
}

#[actix_web::test]
async fn sync_without_credentials_is_unauthorized() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/sync").set_json(json!({}));
    let (status, body) = send_request(req, MockStorage::new(), MockMarketplace::new()).await;
    info!("Response body: {body}");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No API key or internal secret was provided."), "was: {body}");
}

#[actix_web::test]
async fn internal_calls_with_a_bad_secret_are_forbidden() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/sync")
        .insert_header(("x-internal-call", "true"))
        .insert_header(("x-internal-secret", "nope"))
        .set_json(json!({ "organization_id": "org-1" }));
    let (status, body) = send_request(req, MockStorage::new(), MockMarketplace::new()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("internal service secret does not match"), "was: {body}");
}

#[actix_web::test]
async fn internal_calls_must_name_an_organization() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/sync")
        .insert_header(("x-internal-call", "true"))
        .insert_header(("x-internal-secret", INTERNAL_SECRET))
        .set_json(json!({}));
    let (status, body) = send_request(req, MockStorage::new(), MockMarketplace::new()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("organization_id or seller_id is required"), "was: {body}");
}

#[actix_web::test]
async fn internal_calls_run_a_targeted_sync() {
    let _ = env_logger::try_init().ok();
    let row = test_integration();
    let mut db = MockStorage::new();
    let row2 = row.clone();
    db.expect_fetch_integration().returning(move |_| Ok(Some(row2.clone())));
    db.expect_fetch_active_integration().returning(move |org, _| {
        assert_eq!(org, "org-1");
        Ok(Some(row.clone()))
    });
    db.expect_upsert_order().times(1).returning(|_| Ok(UpsertOutcome::Created));
    let mut client = MockMarketplace::new();
    client.expect_get_order().times(1).returning(|id, _| {
        Ok(json!({
            "id": id,
            "status": "paid",
            "last_updated": "2024-05-02T11:30:00.000-00:00",
            "buyer": {}, "seller": {}, "order_items": [], "payments": [],
        }))
    });
    let req = TestRequest::post()
        .uri("/sync")
        .insert_header(("x-internal-call", "true"))
        .insert_header(("x-internal-secret", INTERNAL_SECRET))
        .set_json(json!({ "organization_id": "org-1", "order_ids": ["2000001"] }));
    let (status, body) = send_request(req, db, client).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["orders_forced"], json!(1));
    assert_eq!(body["created"], json!(1));
}

#[actix_web::test]
async fn internal_calls_can_select_by_seller() {
    let _ = env_logger::try_init().ok();
    let row = test_integration();
    let mut db = MockStorage::new();
    let row2 = row.clone();
    db.expect_fetch_integration().returning(move |_| Ok(Some(row2.clone())));
    db.expect_fetch_integration_for_seller().returning(move |seller| {
        assert_eq!(seller, "111");
        Ok(Some(row.clone()))
    });
    db.expect_upsert_order().times(1).returning(|_| Ok(UpsertOutcome::Updated));
    let mut client = MockMarketplace::new();
    client.expect_get_order().times(1).returning(|id, _| {
        Ok(json!({
            "id": id,
            "status": "paid",
            "last_updated": "2024-05-02T11:30:00.000-00:00",
            "buyer": {}, "seller": {}, "order_items": [], "payments": [],
        }))
    });
    let req = TestRequest::post()
        .uri("/sync")
        .insert_header(("x-internal-call", "true"))
        .insert_header(("x-internal-secret", INTERNAL_SECRET))
        .set_json(json!({ "seller_id": "111", "order_ids": ["2000002"] }));
    let (status, body) = send_request(req, db, client).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["updated"], json!(1));
}

#[actix_web::test]
async fn api_keys_cannot_sync_a_foreign_seller() {
    let _ = env_logger::try_init().ok();
    let mut row = test_integration();
    row.organization_id = "org-2".to_string();
    let mut db = MockStorage::new();
    db.expect_org_for_api_key().returning(|_| Ok(Some("org-1".to_string())));
    db.expect_fetch_integration_for_seller().returning(move |_| Ok(Some(row.clone())));
    let req = TestRequest::post()
        .uri("/sync")
        .insert_header(("Authorization", "Bearer key-abc"))
        .set_json(json!({ "seller_id": "111" }));
    let (status, body) = send_request(req, db, MockMarketplace::new()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("does not belong to the requested organization"), "was: {body}");
}

#[actix_web::test]
async fn api_keys_resolve_the_caller_organization() {
    let _ = env_logger::try_init().ok();
    let row = test_integration();
    let mut db = MockStorage::new();
    let expected_hash = sha256_hex("key-abc");
    db.expect_org_for_api_key().times(1).returning(move |hash| {
        assert_eq!(hash, expected_hash);
        Ok(Some("org-1".to_string()))
    });
    let row2 = row.clone();
    db.expect_fetch_integration().returning(move |_| Ok(Some(row2.clone())));
    db.expect_fetch_active_integration().returning(move |_, _| Ok(Some(row.clone())));
    db.expect_last_update_watermark().returning(|_, _| Ok(None));
    let mut client = MockMarketplace::new();
    client.expect_search_orders().times(1).returning(|_, _, _, _, _| Ok(empty_page()));
    let req = TestRequest::post()
        .uri("/sync")
        .insert_header(("Authorization", "Bearer key-abc"))
        .set_json(json!({}));
    let (status, body) = send_request(req, db, client).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["orders_found"], json!(0));
}

#[actix_web::test]
async fn api_keys_cannot_sync_someone_elses_organization() {
    let _ = env_logger::try_init().ok();
    let mut db = MockStorage::new();
    db.expect_org_for_api_key().returning(|_| Ok(Some("org-1".to_string())));
    let req = TestRequest::post()
        .uri("/sync")
        .insert_header(("Authorization", "Bearer key-abc"))
        .set_json(json!({ "organization_id": "org-2" }));
    let (status, body) = send_request(req, db, MockMarketplace::new()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("does not belong to the requested organization"), "was: {body}");
}

#[actix_web::test]
async fn syncing_an_unconnected_organization_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut db = MockStorage::new();
    db.expect_fetch_active_integration().returning(|_, _| Ok(None));
    let req = TestRequest::post()
        .uri("/sync")
        .insert_header(("x-internal-call", "true"))
        .insert_header(("x-internal-secret", INTERNAL_SECRET))
        .set_json(json!({ "organization_id": "org-9" }));
    let (status, body) = send_request(req, db, MockMarketplace::new()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("org-9"), "was: {body}");
}
