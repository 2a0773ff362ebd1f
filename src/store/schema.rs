pub const SCHEMA: &str = r#"
-- One row per stored dataset; row data lives in dataset_<prefix> tables
CREATE TABLE IF NOT EXISTS datasets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    file_hash TEXT NOT NULL UNIQUE,   -- sha256 of the CSV rendering
    upload_date TEXT NOT NULL,
    file_size INTEGER NOT NULL DEFAULT 0,
    row_count INTEGER NOT NULL DEFAULT 0,
    column_count INTEGER NOT NULL DEFAULT 0,
    file_type TEXT NOT NULL DEFAULT 'unknown',
    processing_log TEXT NOT NULL DEFAULT '[]',  -- JSON list of strings
    user_email TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]'             -- JSON list of strings
);

-- Append-only provenance
CREATE TABLE IF NOT EXISTS processing_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id INTEGER NOT NULL REFERENCES datasets(id),
    operation TEXT NOT NULL,
    parameters TEXT NOT NULL DEFAULT '{}',      -- JSON object
    timestamp TEXT NOT NULL,
    user_email TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL UNIQUE,
    user_email TEXT NOT NULL DEFAULT '',
    start_time TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    datasets_processed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_datasets_upload_date ON datasets(upload_date);
CREATE INDEX IF NOT EXISTS idx_datasets_user_email ON datasets(user_email);
CREATE INDEX IF NOT EXISTS idx_history_dataset ON processing_history(dataset_id);
"#;

/// Prefix of physical data tables.
pub const DATA_TABLE_PREFIX: &str = "dataset_";

/// Hex characters of the fingerprint used in a physical table name.
pub const DATA_TABLE_HASH_LEN: usize = 16;

pub fn data_table_name(fingerprint: &str) -> String {
    let end = fingerprint.len().min(DATA_TABLE_HASH_LEN);
    format!("{DATA_TABLE_PREFIX}{}", &fingerprint[..end])
}

/// Quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_table_name() {
        let fp = "0123456789abcdef0123456789abcdef";
        assert_eq!(data_table_name(fp), "dataset_0123456789abcdef");
        assert_eq!(data_table_name("abc"), "dataset_abc");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
