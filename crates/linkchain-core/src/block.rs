use serde::Serialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::HashError;
use crate::hash::{canonicalize, digest_value, Hash, SENTINEL_DIGEST};

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// An unsealed block. Fields are freely editable until `seal` fixes them.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockCandidate {
    pub index: u64,
    pub timestamp: u64,
    pub payload: Value,
    pub previous_digest: Hash,
}

impl BlockCandidate {
    pub fn new(index: u64, timestamp: u64, payload: Value, previous_digest: Hash) -> Self {
        Self {
            index,
            timestamp,
            payload,
            previous_digest,
        }
    }

    /// Candidate for any serializable payload.
    pub fn with_payload<T: Serialize + ?Sized>(
        index: u64,
        timestamp: u64,
        payload: &T,
        previous_digest: Hash,
    ) -> Result<Self, HashError> {
        Ok(Self::new(
            index,
            timestamp,
            canonicalize(payload)?,
            previous_digest,
        ))
    }

    pub fn genesis(payload: Value, timestamp: u64) -> Self {
        Self::new(0, timestamp, payload, SENTINEL_DIGEST)
    }

    /// Computes the digest once and freezes the block.
    pub fn seal(self) -> Block {
        let digest = digest_value(
            self.index,
            self.timestamp,
            &self.payload,
            &self.previous_digest,
        );
        Block {
            index: self.index,
            timestamp: self.timestamp,
            payload: self.payload,
            previous_digest: self.previous_digest,
            digest,
        }
    }
}

/// A sealed block. It has no mutators; a changed block is a new block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Block {
    index: u64,
    timestamp: u64,
    payload: Value,
    previous_digest: Hash,
    digest: Hash,
}

impl Block {
    /// Rebuilds a sealed block from persisted fields, trusting the stored
    /// digest. Use `verify_integrity` or the validator to judge it.
    pub fn from_parts(
        index: u64,
        timestamp: u64,
        payload: Value,
        previous_digest: Hash,
        digest: Hash,
    ) -> Self {
        Self {
            index,
            timestamp,
            payload,
            previous_digest,
            digest,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn previous_digest(&self) -> &Hash {
        &self.previous_digest
    }

    pub fn digest(&self) -> &Hash {
        &self.digest
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Recomputes the digest from the block's fields.
    pub fn recompute_digest(&self) -> Hash {
        digest_value(
            self.index,
            self.timestamp,
            &self.payload,
            &self.previous_digest,
        )
    }

    /// True when the stored digest still matches the block's contents.
    pub fn verify_integrity(&self) -> bool {
        self.recompute_digest() == self.digest
    }

    /// Copies the sealed fields back into an editable candidate.
    pub fn to_candidate(&self) -> BlockCandidate {
        BlockCandidate::new(
            self.index,
            self.timestamp,
            self.payload.clone(),
            self.previous_digest,
        )
    }

    pub fn into_parts(self) -> (u64, u64, Value, Hash, Hash) {
        (
            self.index,
            self.timestamp,
            self.payload,
            self.previous_digest,
            self.digest,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;
    use serde_json::json;

    #[test]
    fn seal_matches_hash_engine() {
        let block = BlockCandidate::new(1, 1_600_000_000, json!({"qty": 15}), [3u8; 32]).seal();
        let expected = digest(1, 1_600_000_000, &json!({"qty": 15}), &[3u8; 32]).unwrap();
        assert_eq!(block.digest(), &expected);
        assert!(block.verify_integrity());
    }

    #[test]
    fn genesis_candidate_uses_sentinel() {
        let genesis = BlockCandidate::genesis(json!("Genesis Block"), 0).seal();
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_digest(), &SENTINEL_DIGEST);
        assert!(genesis.is_genesis());
        assert!(genesis.verify_integrity());
    }

    #[test]
    fn with_payload_serializes_structs() {
        #[derive(Serialize)]
        struct Order {
            qty: u32,
        }
        let candidate = BlockCandidate::with_payload(2, 10, &Order { qty: 25 }, [0u8; 32]).unwrap();
        assert_eq!(candidate.payload, json!({"qty": 25}));
    }

    #[test]
    fn tampered_parts_fail_integrity() {
        let block = BlockCandidate::new(1, 5, json!({"qty": 15}), [0u8; 32]).seal();
        let (index, timestamp, _, previous, digest) = block.clone().into_parts();
        let forged = Block::from_parts(index, timestamp, json!({"qty": 1500}), previous, digest);
        assert!(!forged.verify_integrity());

        let restored = Block::from_parts(index, timestamp, json!({"qty": 15}), previous, digest);
        assert_eq!(restored, block);
        assert!(restored.verify_integrity());
    }

    #[test]
    fn resealing_a_candidate_produces_a_new_block() {
        let block = BlockCandidate::new(1, 5, json!({"qty": 15}), [0u8; 32]).seal();
        let mut candidate = block.to_candidate();
        candidate.previous_digest = [7u8; 32];
        let resealed = candidate.seal();
        assert_ne!(resealed.digest(), block.digest());
        assert_eq!(block.previous_digest(), &[0u8; 32]);
        assert!(resealed.verify_integrity());
    }

    #[test]
    fn now_millis_is_positive() {
        assert!(now_millis() > 0);
    }
}
