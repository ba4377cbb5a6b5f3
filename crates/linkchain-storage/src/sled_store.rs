use crate::record::StoredBlock;
use anyhow::{anyhow, bail, Context, Result};
use linkchain_core::{Block, BlockLog, Hash};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::{Db, IVec, Transactional, Tree};
use std::path::Path;
use tracing::{debug, info, warn};

const TREE_BLOCKS: &str = "blocks";
const KEY_TIP_HEIGHT: &[u8] = b"tip_height";
const KEY_TIP_HASH: &[u8] = b"tip_hash";

/// Sled-backed block log. Blocks live in their own tree keyed by big-endian
/// index, so iteration order is chain order.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let db = sled::open(path).with_context(|| format!("open sled db at {}", path.display()))?;
    let blocks = db.open_tree(TREE_BLOCKS).context("open blocks tree")?;
    info!(path = %path.display(), blocks = blocks.len(), "sled store opened");
    Ok(Self { db, blocks })
  }

  /// Throwaway store that disappears on drop; handy for tests and demos.
  pub fn temporary() -> Result<Self> {
    let db = sled::Config::new().temporary(true).open()?;
    let blocks = db.open_tree(TREE_BLOCKS)?;
    Ok(Self { db, blocks })
  }

  pub fn len(&self) -> u64 {
    self.blocks.len() as u64
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
    self
      .blocks
      .get(index.to_be_bytes())?
      .map(|ivec: IVec| StoredBlock::decode(&ivec)?.into_block())
      .transpose()
  }

  pub fn tip_height(&self) -> Result<Option<u64>> {
    self
      .db
      .get(KEY_TIP_HEIGHT)?
      .map(|v| {
        let arr = <[u8; 8]>::try_from(&v[..]).context("tip height is not 8 bytes")?;
        Ok::<_, anyhow::Error>(u64::from_be_bytes(arr))
      })
      .transpose()
  }

  pub fn tip_hash(&self) -> Result<Option<Hash>> {
    self
      .db
      .get(KEY_TIP_HASH)?
      .map(|v| {
        let arr = Hash::try_from(&v[..]).context("tip hash is not 32 bytes")?;
        Ok::<_, anyhow::Error>(arr)
      })
      .transpose()
  }

  /// Removes every block and the tip markers.
  pub fn clear(&self) -> Result<()> {
    self.blocks.clear()?;
    self.db.remove(KEY_TIP_HEIGHT)?;
    self.db.remove(KEY_TIP_HASH)?;
    self.db.flush()?;
    Ok(())
  }

  pub fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }
}

impl SledStore {
  /// Writes the block and both tip markers in one transaction. Refuses to
  /// overwrite an existing index or to leave a gap behind the new block.
  fn commit(&self, block: &Block) -> Result<()> {
    let index = block.index();
    let key = index.to_be_bytes();
    let bytes = StoredBlock::from(block).encode()?;
    let outcome: TransactionResult<(), String> =
      (&self.blocks, &*self.db).transaction(|(blocks, meta)| {
        if blocks.get(&key[..])?.is_some() {
          return Err(ConflictableTransactionError::Abort(format!(
            "block {index} is already in the log"
          )));
        }
        if index > 0 && blocks.get(&(index - 1).to_be_bytes()[..])?.is_none() {
          return Err(ConflictableTransactionError::Abort(format!(
            "block {index} has no predecessor in the log"
          )));
        }
        blocks.insert(&key[..], &bytes[..])?;
        meta.insert(KEY_TIP_HEIGHT, &key[..])?;
        meta.insert(KEY_TIP_HASH, &block.digest()[..])?;
        Ok(())
      });
    match outcome {
      Ok(()) => Ok(()),
      Err(TransactionError::Abort(reason)) => bail!("append-only log rejected write: {reason}"),
      Err(TransactionError::Storage(e)) => Err(e).context("sled transaction failed"),
    }
  }

  /// Undoes a committed block whose flush failed, restoring the previous tip.
  fn rollback(&self, block: &Block) -> Result<()> {
    let index = block.index();
    let outcome: TransactionResult<(), String> =
      (&self.blocks, &*self.db).transaction(|(blocks, meta)| {
        blocks.remove(&index.to_be_bytes()[..])?;
        if index == 0 {
          meta.remove(KEY_TIP_HEIGHT)?;
          meta.remove(KEY_TIP_HASH)?;
        } else {
          meta.insert(KEY_TIP_HEIGHT, &(index - 1).to_be_bytes()[..])?;
          meta.insert(KEY_TIP_HASH, &block.previous_digest()[..])?;
        }
        Ok(())
      });
    outcome.map_err(|e| anyhow!("roll back block {index}: {e}"))
  }
}

impl BlockLog for SledStore {
  fn append(&self, block: &Block) -> Result<()> {
    self.commit(block)?;
    if let Err(e) = self.db.flush() {
      warn!(index = block.index(), error = %e, "flush failed, rolling back block");
      self.rollback(block)?;
      return Err(e).context("flush block to disk");
    }
    debug!(index = block.index(), "block persisted");
    Ok(())
  }

  fn load_all(&self) -> Result<Vec<Block>> {
    let blocks = self
      .blocks
      .iter()
      .values()
      .map(|bytes| StoredBlock::decode(&bytes?)?.into_block())
      .collect::<Result<Vec<_>>>()?;
    info!(blocks = blocks.len(), "loaded chain from sled");
    Ok(blocks)
  }
}
