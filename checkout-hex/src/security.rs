//! Payment gateway signatures.
//!
//! Outgoing charges carry an integrity signature; incoming events carry a
//! checksum over selected properties. Both are SHA-256 hex digests.

use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Integrity signature for a charge:
/// `sha256(reference + amount_in_cents + currency + integrity_secret)`.
pub fn integrity_signature(
    reference: &str,
    amount_in_cents: i64,
    currency: &str,
    integrity_secret: &str,
) -> String {
    sha256_hex(&format!(
        "{reference}{amount_in_cents}{currency}{integrity_secret}"
    ))
}

/// Verifies the checksum of a gateway event.
///
/// The expected payload carries
/// `signature: {properties: ["transaction.id", ...], checksum}` and a
/// `timestamp`. Each property is a dot path under `data`; their values are
/// concatenated, followed by the timestamp and the events secret, and hashed.
/// Anything missing fails verification.
pub fn verify_event_checksum(payload: &Value, events_secret: &str) -> bool {
    let Some(signature) = payload.get("signature") else {
        return false;
    };
    let Some(checksum) = signature.get("checksum").and_then(Value::as_str) else {
        return false;
    };
    let Some(properties) = signature.get("properties").and_then(Value::as_array) else {
        return false;
    };
    let Some(timestamp) = payload.get("timestamp").and_then(scalar_to_string) else {
        return false;
    };
    let Some(data) = payload.get("data") else {
        return false;
    };

    let mut concatenated = String::new();
    for property in properties {
        let Some(path) = property.as_str() else {
            return false;
        };
        match lookup(data, path).and_then(scalar_to_string) {
            Some(value) => concatenated.push_str(&value),
            None => return false,
        }
    }
    concatenated.push_str(&timestamp);
    concatenated.push_str(events_secret);

    let expected = sha256_hex(&concatenated);
    let provided = checksum.to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, segment| node.get(segment))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
