use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
    HttpResponse,
};
use chrono::{Duration, Utc};
use log::debug;
use mercado_sync_engine::{
    crypto::VaultKey,
    db_types::Integration,
    test_utils::mocks::{MockMarketplace, MockStorage, SharedMarketplace, SharedStorage},
    traits::{SyncMarketplace, SyncStorage},
    CredentialVaultApi,
    MarketplaceAppCredentials,
    OrderSyncApi,
    MARKETPLACE,
};
use msg_common::Secret;

use crate::{
    config::AuthConfig,
    middleware::WebhookSignatureFactory,
    routes::SyncNowRoute,
    webhook::MeliWebhookRoute,
};

pub const INTERNAL_SECRET: &str = "test-internal-secret";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

pub fn test_auth_config() -> AuthConfig {
    AuthConfig { internal_secret: Secret::new(INTERNAL_SECRET.to_string()) }
}

/// A valid, unexpired integration row with legacy plaintext tokens, so the vault hands out "token-1" without
/// touching the token endpoint.
pub fn test_integration() -> Integration {
    let now = Utc::now();
    Integration {
        id: 1,
        organization_id: "org-1".to_string(),
        marketplace: MARKETPLACE.to_string(),
        external_account_id: Some("111".to_string()),
        access_token: "token-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at: now + Duration::hours(6),
        created_at: now - Duration::days(30),
        updated_at: now,
    }
}

/// Registers the routes against any storage/marketplace pair. Tests that need to interpose on the storage
/// (see the ack-timing test) pass their own wrapper here.
pub fn configure_app_with<B, C>(db: B, client: C) -> impl FnOnce(&mut ServiceConfig)
where
    B: SyncStorage + 'static,
    C: SyncMarketplace + 'static,
{
    move |cfg| {
        let app_credentials = MarketplaceAppCredentials {
            client_id: "123456".to_string(),
            client_secret: Secret::new("app-secret".to_string()),
        };
        let vault = CredentialVaultApi::new(db.clone(), client.clone(), VaultKey::random(), app_credentials);
        let api = OrderSyncApi::new(db.clone(), client, vault);
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(db))
            .app_data(web::Data::new(test_auth_config()))
            .service(MeliWebhookRoute::<B, C>::new())
            .service(SyncNowRoute::<B, C>::new());
    }
}

pub fn configure_app(db: MockStorage, client: MockMarketplace) -> impl FnOnce(&mut ServiceConfig) {
    configure_app_with(SharedStorage::new(db), SharedMarketplace::new(client))
}

pub async fn send_request(
    req: TestRequest,
    db: MockStorage,
    client: MockMarketplace,
) -> (StatusCode, String) {
    let app = App::new().configure(configure_app(db, client));
    let app = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::call_service(&app, req.to_request()).await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

/// Like [`send_request`], but the routes sit behind the webhook signature middleware under `/meli`, as they
/// do on the real server. `checks_enabled` maps to the `MSG_WEBHOOK_HMAC_CHECKS` switch.
pub async fn send_guarded_request(
    req: TestRequest,
    db: MockStorage,
    client: MockMarketplace,
    checks_enabled: bool,
) -> (StatusCode, String) {
    let guard = WebhookSignatureFactory::new("X-Signature", Secret::new(WEBHOOK_SECRET.to_string()), checks_enabled);
    let app = App::new().service(web::scope("/meli").wrap(guard).configure(configure_app(db, client)));
    let app = test::init_service(app).await;
    debug!("Making signed request");
    // A rejection surfaces as an Err from the middleware; render it the way the server would.
    let res = match test::try_call_service(&app, req.to_request()).await {
        Ok(res) => res.into_parts().1,
        Err(e) => HttpResponse::from_error(e),
    };
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
