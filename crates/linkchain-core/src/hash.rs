//! Block digest computation.
//!
//! A digest is SHA-256 over the block's canonical byte layout:
//!
//! ```text
//! index (u64 LE) || timestamp (u64 LE) || previous_digest (32 bytes) || canonical JSON payload
//! ```
//!
//! Canonical JSON sorts object keys at every depth and carries no
//! whitespace, so structurally equal payloads hash the same in every run.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::constants::HASH_SIZE;
use crate::error::HashError;
use crate::finite;

pub type Hash = [u8; HASH_SIZE];

/// Previous digest recorded by the genesis block.
pub const SENTINEL_DIGEST: Hash = [0u8; HASH_SIZE];

/// Converts any serializable payload into the JSON value the chain stores.
///
/// NaN and infinities are rejected rather than stored as `null`.
pub fn canonicalize<T: Serialize + ?Sized>(payload: &T) -> Result<Value, HashError> {
    finite::check(payload).map_err(|e| HashError::Serialization(e.to_string()))?;
    serde_json::to_value(payload).map_err(|e| HashError::Serialization(e.to_string()))
}

/// Canonical JSON text of a payload value.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        leaf => out.push_str(&leaf.to_string()),
    }
}

/// Bytes fed to the hash function for a block with these fields.
pub fn hash_bytes(index: u64, timestamp: u64, payload: &Value, previous_digest: &Hash) -> Vec<u8> {
    let payload = canonical_json(payload);
    let mut bytes = Vec::with_capacity(8 + 8 + HASH_SIZE + payload.len());
    bytes.extend_from_slice(&index.to_le_bytes());
    bytes.extend_from_slice(&timestamp.to_le_bytes());
    bytes.extend_from_slice(previous_digest);
    bytes.extend_from_slice(payload.as_bytes());
    bytes
}

pub(crate) fn digest_value(
    index: u64,
    timestamp: u64,
    payload: &Value,
    previous_digest: &Hash,
) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(hash_bytes(index, timestamp, payload, previous_digest));
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// Digest over `(index, timestamp, payload, previous_digest)`.
///
/// Fails only when `payload` cannot be represented as JSON.
pub fn digest<T: Serialize + ?Sized>(
    index: u64,
    timestamp: u64,
    payload: &T,
    previous_digest: &Hash,
) -> Result<Hash, HashError> {
    let value = canonicalize(payload)?;
    Ok(digest_value(index, timestamp, &value, previous_digest))
}
