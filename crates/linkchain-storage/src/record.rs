use anyhow::{Context, Result};
use linkchain_core::{canonical_json, Block, Hash};
use serde::{Deserialize, Serialize};

/// On-disk form of a sealed block. The payload is kept as canonical JSON
/// text so the record stays bincode-friendly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub index: u64,
    pub timestamp: u64,
    pub payload_json: String,
    pub previous_digest: Hash,
    pub digest: Hash,
}

impl From<&Block> for StoredBlock {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index(),
            timestamp: block.timestamp(),
            payload_json: canonical_json(block.payload()),
            previous_digest: *block.previous_digest(),
            digest: *block.digest(),
        }
    }
}

impl StoredBlock {
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("encode stored block")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).context("decode stored block")
    }

    /// Rebuilds the sealed block with its stored digest untouched.
    pub fn into_block(self) -> Result<Block> {
        let payload = serde_json::from_str(&self.payload_json)
            .with_context(|| format!("payload of block {} is not valid JSON", self.index))?;
        Ok(Block::from_parts(
            self.index,
            self.timestamp,
            payload,
            self.previous_digest,
            self.digest,
        ))
    }
}
