pub use meli_tools::helpers::{parse_date, value_id};
use serde_json::Value;

/// Collects candidate shipment ids from an order payload. Ids can appear under `shipping.id` and in a
/// `shipments` array whose entries are either bare ids or objects with an `id` field. Duplicates are removed
/// while preserving first-seen order.
pub fn shipment_ids(order: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(id) = value_id(&order["shipping"]["id"]) {
        ids.push(id);
    }
    if let Some(entries) = order["shipments"].as_array() {
        for entry in entries {
            let id = value_id(entry).or_else(|| value_id(&entry["id"]));
            if let Some(id) = id {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    ids
}
