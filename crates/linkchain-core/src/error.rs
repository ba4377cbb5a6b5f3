use std::time::Duration;
use thiserror::Error;

/// Failure to turn a payload into canonical bytes for hashing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("payload cannot be canonically serialized: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store already holds a genesis block")]
    AlreadyInitialized,
    #[error("store has no blocks")]
    EmptyStore,
    #[error("out of order append: expected index {expected}, got {got}")]
    OutOfOrderAppend { expected: u64, got: u64 },
    #[error("block {index} does not link to the current tail")]
    LinkMismatch { index: u64 },
    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: u64, len: u64 },
}

/// Everything `ChainManager::propose` can fail with. The chain is unchanged
/// whenever one of these is returned.
#[derive(Debug, Error)]
pub enum ProposeError {
    #[error(transparent)]
    Serialization(#[from] HashError),
    #[error(transparent)]
    Append(#[from] StoreError),
    #[error("timed out after {0:?} waiting for the chain lock")]
    LockTimeout(Duration),
    #[error("persisting block {index} failed: {reason}")]
    Persist { index: u64, reason: String },
}
