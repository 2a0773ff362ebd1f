mod schema;
mod sqlite;

pub use schema::{DATA_TABLE_HASH_LEN, data_table_name};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::table::Table;
use crate::types::*;

/// Store defines the dataset persistence interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Dataset operations
    fn save_dataset(&self, table: &Table, meta: &NewDataset) -> Result<i64>;
    fn load_dataset(&self, id: i64) -> Result<Option<Table>>;
    fn get_dataset(&self, id: i64) -> Result<Option<DatasetRecord>>;
    fn search_datasets(&self, query: &str, owner_email: &str) -> Result<Vec<DatasetSummary>>;
    fn delete_dataset(&self, id: i64) -> Result<bool>;
    fn statistics(&self) -> Result<StoreStatistics>;

    // Processing history (append-only)
    fn log_operation(
        &self,
        dataset_id: i64,
        operation: &str,
        parameters: &serde_json::Value,
        actor_email: &str,
    ) -> Result<i64>;
    fn get_history(&self, dataset_id: i64) -> Result<Vec<HistoryEntry>>;

    // Session log
    fn start_session(&self, user_email: &str) -> Result<Session>;
    fn record_session_activity(&self, session_id: &str, datasets_processed: i64) -> Result<()>;
    fn get_session(&self, session_id: &str) -> Result<Option<Session>>;
}
