use serde_json::Value;

use crate::block::{Block, BlockCandidate};
use crate::error::StoreError;

/// Append-only, in-memory sequence of sealed blocks.
///
/// A fresh store is empty. `initialize` places the genesis block exactly
/// once; after that `append` is the only mutator.
#[derive(Clone, Debug, Default)]
pub struct ChainStore {
    blocks: Vec<Block>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// New store holding only a genesis block.
    pub fn with_genesis(genesis_payload: Value, genesis_timestamp: u64) -> Self {
        Self {
            blocks: vec![BlockCandidate::genesis(genesis_payload, genesis_timestamp).seal()],
        }
    }

    /// Rebuilds a store from previously persisted blocks. The blocks are
    /// taken as-is; run the validator to check them.
    pub fn restore(blocks: Vec<Block>) -> Result<Self, StoreError> {
        if blocks.is_empty() {
            return Err(StoreError::EmptyStore);
        }
        Ok(Self { blocks })
    }

    pub fn initialize(
        &mut self,
        genesis_payload: Value,
        genesis_timestamp: u64,
    ) -> Result<&Block, StoreError> {
        if !self.blocks.is_empty() {
            return Err(StoreError::AlreadyInitialized);
        }
        self.blocks
            .push(BlockCandidate::genesis(genesis_payload, genesis_timestamp).seal());
        self.tail()
    }

    /// Checks that `block` would be accepted by `append` without storing it.
    pub fn check_append(&self, block: &Block) -> Result<(), StoreError> {
        let tail = self.tail()?;
        let expected = self.len();
        if block.index() != expected {
            return Err(StoreError::OutOfOrderAppend {
                expected,
                got: block.index(),
            });
        }
        if block.previous_digest() != tail.digest() {
            return Err(StoreError::LinkMismatch {
                index: block.index(),
            });
        }
        Ok(())
    }

    pub fn append(&mut self, block: Block) -> Result<(), StoreError> {
        self.check_append(&block)?;
        self.blocks.push(block);
        Ok(())
    }

    pub fn tail(&self) -> Result<&Block, StoreError> {
        self.blocks.last().ok_or(StoreError::EmptyStore)
    }

    pub fn len(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn at(&self, index: u64) -> Result<&Block, StoreError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.blocks.get(i))
            .ok_or(StoreError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Up to `limit` blocks starting at `start`. Empty past the tail.
    pub fn range(&self, start: u64, limit: u64) -> &[Block] {
        let len = self.blocks.len();
        let start = usize::try_from(start).unwrap_or(len).min(len);
        let end = start
            .saturating_add(usize::try_from(limit).unwrap_or(usize::MAX))
            .min(len);
        &self.blocks[start..end]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}
