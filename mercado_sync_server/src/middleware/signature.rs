//! Webhook signature middleware.
//!
//! The sender signs the raw request body with HMAC-SHA256 under the shared webhook secret and puts the
//! lowercase hex digest in the `X-Signature` header. The webhook scope is wrapped with this middleware, so
//! unsigned or tampered payloads are rejected before a handler ever parses them. Rejections carry the same
//! JSON error body as every other error on this server.
//!
//! The digest comparison happens inside the MAC (see [`crate::helpers::verify_hmac`]), in constant time.
//!
//! The body is consumed to compute the digest and then re-injected into the request, so handlers and
//! extractors downstream see an untouched payload.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use log::{trace, warn};
use msg_common::Secret;

use crate::{errors::ServerError, helpers::verify_hmac};

pub struct WebhookSignatureFactory {
    header: String,
    secret: Secret<String>,
    // If false, requests pass through without a signature check
    enabled: bool,
}

impl WebhookSignatureFactory {
    pub fn new(header: &str, secret: Secret<String>, enabled: bool) -> Self {
        WebhookSignatureFactory { header: header.into(), secret, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignatureFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureService {
            header: self.header.clone(),
            secret: self.secret.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct WebhookSignatureService<S> {
    header: String,
    secret: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = futures::future::LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let header = self.header.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Passing the request through.");
                return service.call(req).await;
            }
            let Some(signature) = req.headers().get(&header).and_then(|v| v.to_str().ok()).map(String::from)
            else {
                warn!("🔐️ Webhook request to {} carries no {header} header. Rejecting.", req.path());
                return Err(ServerError::MissingSignature.into());
            };
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not read the webhook body for signature verification: {e}");
                ServerError::InvalidRequestBody("Could not read the request body".into())
            })?;
            if !verify_hmac(&secret, &body, &signature) {
                warn!("🔐️ Webhook signature mismatch on {} ({} body bytes). Rejecting.", req.path(), body.len());
                return Err(ServerError::InvalidSignature.into());
            }
            trace!("🔐️ Webhook signature verified ✅️");
            req.set_payload(bytes_to_payload(body));
            service.call(req).await
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
