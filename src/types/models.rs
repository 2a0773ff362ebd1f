use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full metadata record of a stored dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub fingerprint: String,
    pub uploaded_at: DateTime<Utc>,
    pub size_bytes: i64,
    pub row_count: i64,
    pub column_count: i64,
    pub file_type: String,
    pub processing_log: Vec<String>,
    pub owner_email: String,
    pub tags: Vec<String>,
}

/// Catalog entry returned by search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub uploaded_at: DateTime<Utc>,
    pub size_bytes: i64,
    pub row_count: i64,
    pub column_count: i64,
    pub file_type: String,
    pub owner_email: String,
    pub tags: Vec<String>,
}

impl From<DatasetRecord> for DatasetSummary {
    fn from(r: DatasetRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            uploaded_at: r.uploaded_at,
            size_bytes: r.size_bytes,
            row_count: r.row_count,
            column_count: r.column_count,
            file_type: r.file_type,
            owner_email: r.owner_email,
            tags: r.tags,
        }
    }
}

/// Caller-supplied metadata for a new dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewDataset {
    pub name: String,
    pub description: String,
    /// Uploaded size; the CSV rendering size is used when absent.
    pub size_bytes: Option<i64>,
    pub file_type: String,
    pub processing_log: Vec<String>,
    pub owner_email: String,
    pub tags: Vec<String>,
}

impl Default for NewDataset {
    fn default() -> Self {
        Self {
            name: "Unnamed Dataset".to_string(),
            description: String::new(),
            size_bytes: None,
            file_type: "unknown".to_string(),
            processing_log: Vec::new(),
            owner_email: String::new(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub dataset_id: i64,
    pub operation: String,
    pub parameters: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub actor_email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub total_datasets: i64,
    pub total_size_bytes: i64,
    pub datasets_by_type: BTreeMap<String, i64>,
    pub recent_uploads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub session_id: String,
    pub user_email: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub datasets_processed: i64,
}

/// Split a comma-separated tag list, dropping blanks.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
