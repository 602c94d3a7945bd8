// src/db/test_support.rs
// Shared test helpers for database tests

use tempfile::TempDir;

use super::Store;
use crate::config::StoreConfig;

/// Store backed by a fresh temp directory. Keep the `TempDir` alive for the
/// duration of the test.
pub fn setup_test_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = StoreConfig::new(dir.path().join("minerva.db"), dir.path().join("images"));
    (dir, Store::new(config))
}
