use anyhow::Result;

use crate::block::Block;

/// Durable append-only log the manager mirrors every committed block into.
/// This lives in `linkchain-core` so storage backends can depend on the core
/// without a cycle.
pub trait BlockLog: Send + Sync {
    /// Persists `block` durably. Called inside the manager's critical
    /// section, after the block passed the store's append checks.
    fn append(&self, block: &Block) -> Result<()>;

    /// Every persisted block in index order.
    fn load_all(&self) -> Result<Vec<Block>>;
}
