//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are async so a slow marketplace or database call never blocks the worker thread; anything that
//! must outlive the request (webhook dispatch in particular) is spawned onto the runtime instead of awaited.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use mercado_sync_engine::{
    traits::{AuthStore, IntegrationStore, SyncMarketplace, SyncStorage},
    OrderSyncApi,
    SyncOptions,
    SyncSelector,
};
use serde_json::json;

use crate::{
    config::AuthConfig,
    data_objects::SyncRequest,
    errors::{AuthError, ServerError},
    helpers::sha256_hex,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Manual sync  -------------------------------------------------
route!(sync_now => Post "/sync" impl SyncStorage, SyncMarketplace);
/// Route handler for the manual sync endpoint.
///
/// Two kinds of callers are accepted:
/// * Internal services, which set `x-internal-call: true` and present the shared secret in
///   `x-internal-secret`. They must name the integration to sync (by organization or by seller account) in
///   the request body.
/// * External callers, which present an organization API key as a bearer token. The key determines the
///   organization; naming a different one (or a seller account owned by one) is a 403.
///
/// The sync runs inline and the response carries the run's counts.
pub async fn sync_now<B, C>(
    req: HttpRequest,
    body: web::Json<SyncRequest>,
    api: web::Data<OrderSyncApi<B, C>>,
    db: web::Data<B>,
    auth: web::Data<AuthConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: SyncStorage + 'static,
    C: SyncMarketplace + 'static,
{
    trace!("💻️ Received manual sync request");
    let request = body.into_inner();
    let caller_org = authorize_sync(&req, auth.as_ref(), db.as_ref()).await?;
    let selector = resolve_selector(&request, caller_org.as_deref(), db.as_ref()).await?;
    info!("💻️ Manual sync requested: {selector:?} (full: {}, targeted: {})", request.full, !request.order_ids.is_empty());
    let options = SyncOptions { full: request.full, order_ids: request.order_ids, status: request.status };
    let summary = api.sync(&selector, &options).await?;
    let mut response = json!({
        "ok": true,
        "orders_found": summary.orders_found,
        "created": summary.created,
        "updated": summary.updated,
    });
    if summary.forced > 0 {
        response["orders_forced"] = json!(summary.forced);
    }
    Ok(HttpResponse::Ok().json(response))
}

/// Authenticates the caller. `None` means a trusted internal service; `Some(org)` is the organization an API
/// key resolved to.
async fn authorize_sync<B: SyncStorage>(
    req: &HttpRequest,
    auth: &AuthConfig,
    db: &B,
) -> Result<Option<String>, ServerError> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    let internal_call = header("x-internal-call").map(|v| v == "1" || v == "true").unwrap_or(false);
    if internal_call {
        let secret = header("x-internal-secret").ok_or(AuthError::MissingCredentials)?;
        if secret != auth.internal_secret.reveal() {
            warn!("💻️ Rejected an internal sync call with a bad secret");
            return Err(AuthError::InvalidInternalSecret.into());
        }
        return Ok(None);
    }
    let key = header("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingCredentials)?;
    let org = db
        .org_for_api_key(&sha256_hex(key))
        .await
        .map_err(|e| ServerError::BackendError(e.to_string()))?
        .ok_or(AuthError::InvalidApiKey)?;
    Ok(Some(org))
}

/// Turns the request body into a sync selector the caller is allowed to use.
async fn resolve_selector<B: SyncStorage>(
    request: &SyncRequest,
    caller_org: Option<&str>,
    db: &B,
) -> Result<SyncSelector, ServerError> {
    if let Some(seller) = request.seller_id.as_deref() {
        if let Some(org) = caller_org {
            let owner = db
                .fetch_integration_for_seller(seller)
                .await
                .map_err(|e| ServerError::BackendError(e.to_string()))?
                .ok_or_else(|| ServerError::NoRecordFound(format!("No integration owns seller {seller}")))?;
            if owner.organization_id != org {
                warn!("💻️ API key for {org} tried to sync seller {seller}");
                return Err(AuthError::OrganizationMismatch.into());
            }
        }
        return Ok(SyncSelector::BySeller(seller.to_string()));
    }
    match (request.organization_id.as_deref(), caller_org) {
        (Some(requested), Some(org)) if requested != org => {
            warn!("💻️ API key for {org} tried to sync {requested}");
            Err(AuthError::OrganizationMismatch.into())
        },
        (_, Some(org)) => Ok(SyncSelector::ByOrganization(org.to_string())),
        (Some(requested), None) => Ok(SyncSelector::ByOrganization(requested.to_string())),
        (None, None) => Err(ServerError::InvalidRequestBody(
            "organization_id or seller_id is required for internal calls".into(),
        )),
    }
}
