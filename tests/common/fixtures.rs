//! Test database fixtures

use super::constants::TEST_ADDRESS;
use dispatch_server::job_store::{DirectoryStore, SqliteOpsStore};
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a temp-file-backed store seeded with one operator and one
/// customer. Returns the TempDir so the file outlives the test.
pub fn create_seeded_store() -> (TempDir, Arc<SqliteOpsStore>, i64, i64) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("dispatch.db");
    let store = Arc::new(SqliteOpsStore::new(&db_path).expect("Failed to open dispatch store"));

    let operator_id = store
        .insert_operator("Test Operator")
        .expect("Failed to seed operator");
    let customer_id = store
        .insert_customer("Test Customer", TEST_ADDRESS)
        .expect("Failed to seed customer");

    (temp_dir, store, operator_id, customer_id)
}
