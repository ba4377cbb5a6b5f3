//! Chain integrity checks.
//!
//! Every block, genesis included, is checked in this order:
//!
//! 1. its index equals its position,
//! 2. its previous digest equals the predecessor's digest (the sentinel for genesis),
//! 3. its stored digest matches a fresh recomputation.
//!
//! The first violation by position wins. Checks run on the rayon pool but
//! the reported position is always the lowest offending one. An edited
//! genesis block is reported at position 0.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::block::Block;
use crate::hash::SENTINEL_DIGEST;
use crate::store::ChainStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "index", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    DigestMismatch(u64),
    LinkBroken(u64),
    IndexMismatch(u64),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Position of the offending block, if any.
    pub fn position(&self) -> Option<u64> {
        match *self {
            Self::Valid => None,
            Self::DigestMismatch(i) | Self::LinkBroken(i) | Self::IndexMismatch(i) => Some(i),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "chain is valid"),
            Self::DigestMismatch(i) => write!(f, "block {i} digest does not match its contents"),
            Self::LinkBroken(i) => write!(f, "block {i} does not link to its predecessor"),
            Self::IndexMismatch(i) => write!(f, "block at position {i} carries the wrong index"),
        }
    }
}

pub fn validate(blocks: &[Block]) -> ValidationResult {
    blocks
        .par_iter()
        .enumerate()
        .find_map_first(|(position, block)| check_block(blocks, position, block))
        .unwrap_or(ValidationResult::Valid)
}

pub fn validate_store(store: &ChainStore) -> ValidationResult {
    validate(store.blocks())
}

fn check_block(blocks: &[Block], position: usize, block: &Block) -> Option<ValidationResult> {
    let at = position as u64;
    if block.index() != at {
        return Some(ValidationResult::IndexMismatch(at));
    }
    let expected_previous = match position {
        0 => &SENTINEL_DIGEST,
        _ => blocks[position - 1].digest(),
    };
    if block.previous_digest() != expected_previous {
        return Some(ValidationResult::LinkBroken(at));
    }
    if !block.verify_integrity() {
        return Some(ValidationResult::DigestMismatch(at));
    }
    None
}
