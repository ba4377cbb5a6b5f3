#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use linkchain_core::{ChainConfig, ChainManager};
use linkchain_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (temp_dir, db_path)
}

pub fn open_chain(db_path: &Path) -> (Arc<SledStore>, ChainManager) {
    let store = Arc::new(SledStore::open(db_path).expect("Failed to open SledStore"));
    let chain =
        ChainManager::open(store.clone(), ChainConfig::default()).expect("Failed to open chain");
    (store, chain)
}

pub fn remove_temp_dir(temp_dir: TempDir) {
    let db_path = temp_dir.path().to_path_buf();
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}
