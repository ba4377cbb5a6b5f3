//! Append-only hash-chained ledger.
//!
//! Blocks are built as [`BlockCandidate`]s, sealed once into immutable
//! [`Block`]s and appended to a [`ChainStore`] by the [`ChainManager`],
//! which serializes concurrent proposers. [`validate`] walks a chain and
//! reports the first broken invariant.

pub mod block;
pub mod config;
pub mod constants;
pub mod error;
mod finite;
pub mod hash;
pub mod manager;
pub mod persist;
pub mod store;
pub mod validate;

pub use block::{now_millis, Block, BlockCandidate};
pub use config::ChainConfig;
pub use error::{HashError, ProposeError, StoreError};
pub use hash::{canonical_json, canonicalize, digest, Hash, SENTINEL_DIGEST};
pub use manager::{ChainManager, ChainState};
pub use persist::BlockLog;
pub use store::ChainStore;
pub use validate::{validate, validate_store, ValidationResult};
