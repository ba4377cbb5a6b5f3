pub mod record;
pub mod sled_store;

pub use record::StoredBlock;
pub use sled_store::SledStore;
