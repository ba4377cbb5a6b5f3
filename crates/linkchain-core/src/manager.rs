use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::block::{now_millis, Block, BlockCandidate};
use crate::config::ChainConfig;
use crate::error::{ProposeError, StoreError};
use crate::hash::canonicalize;
use crate::persist::BlockLog;
use crate::store::ChainStore;
use crate::validate::{validate_store, ValidationResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainState {
    Uninitialized,
    Ready,
}

/// Owner of a single chain and the only way to extend it.
///
/// `propose` runs its read-tail, seal, append sequence under the write
/// lock, so concurrent proposers are admitted one at a time. Reads take
/// the read lock and never see a half-appended block.
pub struct ChainManager {
    store: RwLock<ChainStore>,
    log: Option<Arc<dyn BlockLog>>,
    config: ChainConfig,
}

impl ChainManager {
    /// New in-memory chain holding only the genesis block.
    pub fn new(config: ChainConfig) -> Self {
        let store = ChainStore::with_genesis(config.genesis_payload.clone(), now_millis());
        Self {
            store: RwLock::new(store),
            log: None,
            config,
        }
    }

    /// Chain backed by `log`. An empty log gets a freshly persisted genesis
    /// block; otherwise the persisted blocks are loaded as-is.
    pub fn open(log: Arc<dyn BlockLog>, config: ChainConfig) -> anyhow::Result<Self> {
        let blocks = log.load_all()?;
        let store = if blocks.is_empty() {
            let store = ChainStore::with_genesis(config.genesis_payload.clone(), now_millis());
            log.append(store.tail()?)?;
            store
        } else {
            ChainStore::restore(blocks)?
        };
        Ok(Self {
            store: RwLock::new(store),
            log: Some(log),
            config,
        })
    }

    /// In-memory chain rebuilt from a block sequence, e.g. a snapshot.
    pub fn restore(blocks: Vec<Block>, config: ChainConfig) -> Result<Self, StoreError> {
        Ok(Self {
            store: RwLock::new(ChainStore::restore(blocks)?),
            log: None,
            config,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn state(&self) -> ChainState {
        if self.store.read().is_empty() {
            ChainState::Uninitialized
        } else {
            ChainState::Ready
        }
    }

    /// Seals `payload` into a new block on top of the current tail, waiting
    /// at most the configured lock timeout.
    pub fn propose<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Block, ProposeError> {
        self.propose_within(payload, self.config.lock_timeout)
    }

    /// Like `propose`, with an explicit bound on waiting for the lock. On
    /// timeout nothing has been touched.
    pub fn propose_within<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        wait: Duration,
    ) -> Result<Block, ProposeError> {
        let payload = canonicalize(payload)?;

        let mut store = self
            .store
            .try_write_for(wait)
            .ok_or(ProposeError::LockTimeout(wait))?;

        let previous_digest = *store.tail()?.digest();
        let block = BlockCandidate::new(store.len(), now_millis(), payload, previous_digest).seal();
        store.check_append(&block)?;

        if let Some(log) = &self.log {
            log.append(&block).map_err(|e| ProposeError::Persist {
                index: block.index(),
                reason: format!("{e:#}"),
            })?;
        }

        store.append(block.clone())?;
        Ok(block)
    }

    pub fn verify(&self) -> ValidationResult {
        validate_store(&self.store.read())
    }

    pub fn snapshot_length(&self) -> u64 {
        self.store.read().len()
    }

    pub fn block_at(&self, index: u64) -> Result<Block, StoreError> {
        self.store.read().at(index).cloned()
    }

    pub fn tail(&self) -> Result<Block, StoreError> {
        self.store.read().tail().cloned()
    }

    pub fn blocks(&self, start: u64, limit: u64) -> Vec<Block> {
        self.store.read().range(start, limit).to_vec()
    }

    /// Copy of the whole chain, suitable for persisting elsewhere.
    pub fn snapshot(&self) -> Vec<Block> {
        self.store.read().blocks().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::SENTINEL_DIGEST;
    use anyhow::anyhow;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryLog {
        blocks: Mutex<Vec<Block>>,
    }

    impl BlockLog for MemoryLog {
        fn append(&self, block: &Block) -> anyhow::Result<()> {
            self.blocks.lock().push(block.clone());
            Ok(())
        }

        fn load_all(&self) -> anyhow::Result<Vec<Block>> {
            Ok(self.blocks.lock().clone())
        }
    }

    struct FailingLog;

    impl BlockLog for FailingLog {
        fn append(&self, _block: &Block) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }

        fn load_all(&self) -> anyhow::Result<Vec<Block>> {
            Ok(vec![BlockCandidate::genesis(json!("Genesis Block"), 0).seal()])
        }
    }

    /// Refuses exactly one append, then behaves like `MemoryLog`.
    #[derive(Default)]
    struct FlakyLog {
        failed: Mutex<bool>,
        inner: MemoryLog,
    }

    impl BlockLog for FlakyLog {
        fn append(&self, block: &Block) -> anyhow::Result<()> {
            let mut failed = self.failed.lock();
            if block.index() > 0 && !*failed {
                *failed = true;
                return Err(anyhow!("flush failed"));
            }
            self.inner.append(block)
        }

        fn load_all(&self) -> anyhow::Result<Vec<Block>> {
            self.inner.load_all()
        }
    }

    #[test]
    fn new_manager_is_ready_with_genesis() {
        let manager = ChainManager::new(ChainConfig::default());
        assert_eq!(manager.state(), ChainState::Ready);
        assert_eq!(manager.snapshot_length(), 1);
        let genesis = manager.block_at(0).unwrap();
        assert_eq!(genesis.previous_digest(), &SENTINEL_DIGEST);
        assert_eq!(genesis.payload(), &json!("Genesis Block"));
    }

    #[test]
    fn propose_links_to_tail() {
        let manager = ChainManager::new(ChainConfig::default());
        let genesis = manager.tail().unwrap();
        let block = manager.propose(&json!({"qty": 15})).unwrap();
        assert_eq!(block.index(), 1);
        assert_eq!(block.previous_digest(), genesis.digest());
        assert_eq!(manager.tail().unwrap(), block);
        assert!(manager.verify().is_valid());
    }

    #[test]
    fn serialization_error_leaves_chain_unchanged() {
        let manager = ChainManager::new(ChainConfig::default());
        let mut payload = HashMap::new();
        payload.insert(vec![1u8], 2u8);
        let err = manager.propose(&payload).unwrap_err();
        assert!(matches!(err, ProposeError::Serialization(_)));
        assert_eq!(manager.snapshot_length(), 1);
    }

    #[test]
    fn non_finite_payload_is_rejected() {
        let manager = ChainManager::new(ChainConfig::default());
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = manager.propose(&v).unwrap_err();
            assert!(matches!(err, ProposeError::Serialization(_)));
        }
        let mut payload = HashMap::new();
        payload.insert("price", f64::NAN);
        assert!(manager.propose(&payload).is_err());
        assert_eq!(manager.snapshot_length(), 1);
        assert!(manager.verify().is_valid());
    }

    #[test]
    fn propose_times_out_while_lock_is_held() {
        let manager = ChainManager::new(ChainConfig::default());
        let guard = manager.store.write();
        let err = manager
            .propose_within(&json!({"qty": 1}), Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, ProposeError::LockTimeout(_)));
        drop(guard);
        assert_eq!(manager.snapshot_length(), 1);
        manager.propose(&json!({"qty": 1})).unwrap();
        assert_eq!(manager.snapshot_length(), 2);
    }

    #[test]
    fn open_persists_genesis_and_every_block() {
        let log = Arc::new(MemoryLog::default());
        let manager = ChainManager::open(log.clone(), ChainConfig::default()).unwrap();
        manager.propose(&json!({"qty": 15})).unwrap();
        manager.propose(&json!({"qty": 25})).unwrap();
        assert_eq!(log.load_all().unwrap(), manager.snapshot());

        let reopened = ChainManager::open(log, ChainConfig::default()).unwrap();
        assert_eq!(reopened.snapshot(), manager.snapshot());
        assert!(reopened.verify().is_valid());
    }

    #[test]
    fn failed_persist_leaves_chain_unchanged() {
        let manager = ChainManager::open(Arc::new(FailingLog), ChainConfig::default()).unwrap();
        let err = manager.propose(&json!({"qty": 15})).unwrap_err();
        match err {
            ProposeError::Persist { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("disk full"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(manager.snapshot_length(), 1);
    }

    #[test]
    fn custom_genesis_payload() {
        let config = ChainConfig::default().with_genesis_payload(json!({"network": "dev"}));
        let manager = ChainManager::new(config);
        assert_eq!(manager.block_at(0).unwrap().payload(), &json!({"network": "dev"}));
    }

    #[test]
    fn restore_rejects_empty_snapshot() {
        let err = ChainManager::restore(Vec::new(), ChainConfig::default()).err();
        assert_eq!(err, Some(StoreError::EmptyStore));
    }

    #[test]
    fn blocks_pages_through_the_chain() {
        let manager = ChainManager::new(ChainConfig::default());
        for qty in 0..5 {
            manager.propose(&json!({ "qty": qty })).unwrap();
        }
        let page = manager.blocks(2, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].index(), 2);
        assert_eq!(page[1].index(), 3);
        assert!(manager.block_at(6).is_err());
    }

    #[test]
    fn chain_recovers_after_a_failed_persist() {
        let log = Arc::new(FlakyLog::default());
        let manager = ChainManager::open(log.clone(), ChainConfig::default()).unwrap();
        let err = manager.propose(&json!({"qty": 15})).unwrap_err();
        assert!(matches!(err, ProposeError::Persist { index: 1, .. }));
        assert_eq!(manager.snapshot_length(), 1);

        let block = manager.propose(&json!({"qty": 25})).unwrap();
        assert_eq!(block.index(), 1);
        assert_eq!(block.payload(), &json!({"qty": 25}));
        assert!(manager.verify().is_valid());
        assert_eq!(log.load_all().unwrap(), manager.snapshot());
    }
}
