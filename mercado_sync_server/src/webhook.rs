//----------------------------------------------   Webhook  ----------------------------------------------------
//! The MercadoLibre webhook receiver and its background dispatch.
//!
//! The marketplace expects an answer within a few hundred milliseconds and retries anything that is not a
//! 2xx, so the handler only validates the notification's shape, spawns the real work onto the runtime, and
//! acknowledges immediately. Every log line of the background dispatch carries the correlation id returned in
//! the ack, so a notification can be traced end to end.

use std::{future::Future, pin::Pin};

use actix_web::{web, HttpResponse};
use log::{debug, info, trace, warn};
use mercado_sync_engine::{
    traits::{SyncMarketplace, SyncStorage},
    OrderSyncApi,
    SyncError,
    SyncOptions,
    SyncSelector,
};
use serde_json::{json, Value};

use crate::{
    data_objects::{JsonResponse, WebhookNotification, SUPPORTED_TOPICS},
    helpers::{correlation_id, resource_id},
    route,
};

route!(meli_webhook => Post "/webhook" impl SyncStorage, SyncMarketplace);
pub async fn meli_webhook<B, C>(
    body: web::Json<WebhookNotification>,
    api: web::Data<OrderSyncApi<B, C>>,
) -> HttpResponse
where
    B: SyncStorage + 'static,
    C: SyncMarketplace + 'static,
{
    let note = body.into_inner();
    let cid = correlation_id();
    trace!("📬️ [{cid}] Received webhook notification: {note:?}");
    let (Some(topic), Some(_), Some(_)) = (note.topic.clone(), note.resource.as_ref(), note.seller_id()) else {
        warn!("📬️ [{cid}] Malformed notification. topic, resource and user_id are all required.");
        return HttpResponse::BadRequest().json(JsonResponse::failure("topic, resource and user_id are required"));
    };
    if !SUPPORTED_TOPICS.contains(&topic.as_str()) {
        info!("📬️ [{cid}] Notification for unsupported topic '{topic}'. Acknowledging without dispatch.");
        return HttpResponse::Ok().json(json!({
            "ok": true,
            "accepted": false,
            "topic": topic,
            "correlation_id": cid,
            "supported_topics": SUPPORTED_TOPICS,
        }));
    }
    // Acknowledge first, work later. The marketplace retries anything slower than a few hundred ms.
    let api = api.into_inner();
    let dispatch_note = note.clone();
    let dispatch_cid = cid.clone();
    actix_web::rt::spawn(async move {
        dispatch_notification(api.as_ref(), dispatch_note, &dispatch_cid).await;
    });
    HttpResponse::Ok().json(json!({ "ok": true, "accepted": true, "topic": topic, "correlation_id": cid }))
}

/// Routes an accepted notification to its handler. Runs in the background, after the 200 has gone out, so
/// every outcome is reported through the log and nothing is returned.
pub async fn dispatch_notification<B, C>(api: &OrderSyncApi<B, C>, note: WebhookNotification, cid: &str)
where
    B: SyncStorage,
    C: SyncMarketplace,
{
    let (Some(topic), Some(resource), Some(seller)) = (note.topic.clone(), note.resource.clone(), note.seller_id())
    else {
        // The handler validated these before spawning; a miss here means a bug in the forwarding path.
        warn!("📬️ [{cid}] Dropping a notification with missing fields: {note:?}");
        return;
    };
    match topic.as_str() {
        "orders" | "orders_v2" => handle_order_notification(api, &seller, &resource, cid).await,
        "shipments" => handle_shipment_notification(api, &note, &seller, &resource, cid).await,
        other => {
            // Accepted so the marketplace stops resending, but there is nothing to sync for these yet.
            debug!("📬️ [{cid}] Topic '{other}' is acknowledged but not routed.");
        },
    }
}

async fn handle_order_notification<B, C>(api: &OrderSyncApi<B, C>, seller: &str, resource: &str, cid: &str)
where
    B: SyncStorage,
    C: SyncMarketplace,
{
    let Some(order_id) = resource_id(resource) else {
        warn!("📬️ [{cid}] Could not extract an order id from resource '{resource}'.");
        return;
    };
    let selector = SyncSelector::BySeller(seller.to_string());
    let options = SyncOptions { order_ids: vec![order_id.clone()], ..SyncOptions::default() };
    match api.sync(&selector, &options).await {
        Ok(summary) => {
            info!(
                "📬️ [{cid}] Order {order_id} routed. {} created, {} updated.",
                summary.created, summary.updated
            );
        },
        Err(SyncError::UnknownSeller(s)) => {
            info!("📬️ [{cid}] No integration owns seller {s}. Notification not routed.");
        },
        Err(e) => warn!("📬️ [{cid}] Could not sync order {order_id}: {e}"),
    }
}

/// Shipment notifications carry no order id, so the shipment is resolved upstream first and the notification
/// is reborn as an order notification, stamped with the forwarding markers.
async fn handle_shipment_notification<B, C>(
    api: &OrderSyncApi<B, C>,
    note: &WebhookNotification,
    seller: &str,
    resource: &str,
    cid: &str,
) where
    B: SyncStorage,
    C: SyncMarketplace,
{
    let Some(shipment_id) = resource_id(resource) else {
        warn!("📬️ [{cid}] Could not extract a shipment id from resource '{resource}'.");
        return;
    };
    let selector = SyncSelector::BySeller(seller.to_string());
    let order_id = match api.order_for_shipment(&selector, &shipment_id).await {
        Ok(order_id) => order_id,
        Err(SyncError::UnknownSeller(s)) => {
            info!("📬️ [{cid}] No integration owns seller {s}. Shipment notification not routed.");
            return;
        },
        Err(e) => {
            warn!("📬️ [{cid}] Could not resolve shipment {shipment_id} to an order: {e}");
            return;
        },
    };
    let forwarded = WebhookNotification {
        topic: Some("orders".to_string()),
        resource: Some(format!("/orders/{order_id}")),
        user_id: note.user_id.clone(),
        forwarded_from: Some("shipments".to_string()),
        shipment_id: Some(shipment_id.clone()),
        original: Some(Box::new(serde_json::to_value(note).unwrap_or(Value::Null))),
        ..WebhookNotification::default()
    };
    debug!(
        "📬️ [{cid}] Shipment {shipment_id} forwarded as an order notification: {}",
        serde_json::to_value(&forwarded).unwrap_or(Value::Null)
    );
    // The forwarded notification goes back through the router, so it takes the same path a direct order
    // notification would. Boxed because the dispatch becomes recursive here.
    let redispatch: Pin<Box<dyn Future<Output = ()> + '_>> = Box::pin(dispatch_notification(api, forwarded, cid));
    redispatch.await;
}
