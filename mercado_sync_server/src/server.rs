use std::time::Duration;

use actix_web::{
    dev::Server,
    http::{KeepAlive, Method},
    middleware::Logger,
    web,
    App,
    HttpRequest,
    HttpResponse,
    HttpServer,
};
use meli_tools::{MeliApi, MeliConfig};
use mercado_sync_engine::{sqlite::db::db_url, CredentialVaultApi, OrderSyncApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::WebhookSignatureFactory,
    routes::{health, SyncNowRoute},
    webhook::MeliWebhookRoute,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let url = if config.database_url.is_empty() { db_url() } else { config.database_url.clone() };
    let db = SqliteDatabase::new_with_url(&url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let client =
        MeliApi::new(MeliConfig::new_from_env_or_default()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = HttpServer::new(move || {
        let vault = CredentialVaultApi::new(
            db.clone(),
            client.clone(),
            config.vault_key.clone(),
            config.meli_credentials.clone(),
        );
        let sync_api = OrderSyncApi::new(db.clone(), client.clone(), vault);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("msg::access_log"))
            .app_data(web::Data::new(sync_api))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(config.auth.clone()));
        // The webhook scope sits behind the signature check; everything else is open or does its own auth.
        let webhook_scope = web::scope("/meli")
            .wrap(WebhookSignatureFactory::new(
                "X-Signature",
                config.webhook.hmac_secret.clone(),
                config.webhook.hmac_checks,
            ))
            .service(MeliWebhookRoute::<SqliteDatabase, MeliApi>::new())
            .default_service(web::route().to(unsupported_method));
        let api_scope = web::scope("/api").service(SyncNowRoute::<SqliteDatabase, MeliApi>::new());
        app.service(health).service(webhook_scope).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Webhook senders occasionally send a bare OPTIONS first; everything else that is not a POST to a known
/// route is a straight 405 so misconfigured senders notice quickly.
async fn unsupported_method(req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        HttpResponse::NoContent().finish()
    } else {
        HttpResponse::MethodNotAllowed().finish()
    }
}
