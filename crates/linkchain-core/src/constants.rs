pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
pub const GENESIS_PAYLOAD: &str = "Genesis Block";
