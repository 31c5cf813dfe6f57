use hmac::{Hmac, Mac};
use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `data` under `secret`, as lowercase hex. This is what webhook senders put in the
/// `X-Signature` header.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a presented signature against the HMAC-SHA256 of `data` under `secret`. The comparison happens
/// inside the MAC in constant time, so a signature cannot be guessed byte by byte.
pub fn verify_hmac(secret: &str, data: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&signature).is_ok()
}

/// API keys are stored as their SHA-256 digest; this produces the lookup hash for a presented key.
pub fn sha256_hex(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Extracts the trailing numeric id from a notification resource path such as `/orders/2000003508419500`.
pub fn resource_id(resource: &str) -> Option<String> {
    let re = Regex::new(r"/([0-9]+)\s*$").unwrap();
    re.captures(resource.trim_end_matches('/')).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}

/// A short random id that ties the ack response to the background dispatch log lines.
pub fn correlation_id() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}
