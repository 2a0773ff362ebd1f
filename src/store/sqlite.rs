use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use super::Store;
use super::schema::{DATA_TABLE_HASH_LEN, SCHEMA, data_table_name, quote_ident};
use crate::error::{Error, Result};
use crate::table::{ColumnType, ROW_ORDINAL_COLUMN, Table, Value};
use crate::types::*;

const RECENT_UPLOAD_DAYS: i64 = 7;

const DATASET_COLUMNS: &str = "id, name, description, file_hash, upload_date, file_size, \
     row_count, column_count, file_type, processing_log, user_email, tags";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width UTC timestamps so that text comparison follows time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_string_list(raw: &str, column: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("Invalid JSON list in datasets.{}: {}", column, e);
        Vec::new()
    })
}

fn dataset_from_row(row: &Row<'_>) -> rusqlite::Result<DatasetRecord> {
    Ok(DatasetRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        fingerprint: row.get(3)?,
        uploaded_at: parse_datetime(&row.get::<_, String>(4)?),
        size_bytes: row.get(5)?,
        row_count: row.get(6)?,
        column_count: row.get(7)?,
        file_type: row.get(8)?,
        processing_log: parse_string_list(&row.get::<_, String>(9)?, "processing_log"),
        owner_email: row.get(10)?,
        tags: parse_string_list(&row.get::<_, String>(11)?, "tags"),
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_email: row.get(2)?,
        started_at: parse_datetime(&row.get::<_, String>(3)?),
        last_activity_at: parse_datetime(&row.get::<_, String>(4)?),
        datasets_processed: row.get(5)?,
    })
}

fn sql_type(kind: ColumnType) -> &'static str {
    match kind {
        ColumnType::Integer => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::Text | ColumnType::Empty => "TEXT",
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(hex::encode(b)),
    }
}

fn data_table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Replace the physical table `name` with the contents of `table`. Row order
/// is kept in an explicit ordinal column, since a user column may shadow
/// `rowid`.
fn write_data_table(conn: &Connection, name: &str, table: &Table) -> Result<()> {
    let quoted = quote_ident(name);
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY", quote_ident(ROW_ORDINAL_COLUMN))];
    columns.extend(
        table
            .headers()
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{} {}", quote_ident(h), sql_type(table.column_type(i)))),
    );

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {quoted}; CREATE TABLE {quoted} ({});",
        columns.join(", ")
    ))?;

    let names: Vec<String> = std::iter::once(ROW_ORDINAL_COLUMN)
        .chain(table.headers().iter().map(String::as_str))
        .map(quote_ident)
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {quoted} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    ))?;
    for (ordinal, row) in table.rows().iter().enumerate() {
        let values = std::iter::once(SqlValue::Integer(ordinal as i64))
            .chain(row.iter().map(to_sql));
        stmt.execute(params_from_iter(values))?;
    }

    tracing::debug!("Wrote {} rows into {}", table.n_rows(), name);
    Ok(())
}

fn read_data_table(conn: &Connection, name: &str) -> Result<Table> {
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {} ORDER BY {}",
        quote_ident(name),
        quote_ident(ROW_ORDINAL_COLUMN)
    ))?;
    let (columns, headers): (Vec<usize>, Vec<String>) = stmt
        .column_names()
        .iter()
        .enumerate()
        .filter(|(_, h)| **h != ROW_ORDINAL_COLUMN)
        .map(|(i, h)| (i, h.to_string()))
        .unzip();

    let rows = stmt.query_map([], |row| {
        columns
            .iter()
            .map(|&i| row.get_ref(i).map(from_sql))
            .collect::<rusqlite::Result<Vec<Value>>>()
    })?;
    let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;

    Table::new(headers, rows)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        tracing::info!("Database initialized successfully");
        Ok(())
    }

    // Dataset operations

    fn save_dataset(&self, table: &Table, meta: &NewDataset) -> Result<i64> {
        if meta.name.trim().is_empty() {
            return Err(Error::Validation("dataset name cannot be empty".to_string()));
        }
        if table.n_cols() == 0 {
            return Err(Error::Validation("dataset has no columns".to_string()));
        }

        let fingerprint = table.fingerprint()?;
        let table_name = data_table_name(&fingerprint);
        let size_bytes = match meta.size_bytes {
            Some(size) => size,
            None => table.estimated_size()?,
        };

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM datasets WHERE file_hash = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing_id) = existing {
            return Err(Error::DuplicateContent { existing_id });
        }

        let prefix_owner: Option<i64> = tx
            .query_row(
                "SELECT id FROM datasets WHERE substr(file_hash, 1, ?1) = ?2",
                params![
                    DATA_TABLE_HASH_LEN as i64,
                    &fingerprint[..DATA_TABLE_HASH_LEN]
                ],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(owner) = prefix_owner {
            return Err(Error::Conflict(format!(
                "data table {table_name} already belongs to dataset {owner}"
            )));
        }

        write_data_table(&tx, &table_name, table)?;

        tx.execute(
            "INSERT INTO datasets (name, description, file_hash, upload_date, file_size,
                row_count, column_count, file_type, processing_log, user_email, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                meta.name,
                meta.description,
                fingerprint,
                format_datetime(&Utc::now()),
                size_bytes,
                table.n_rows() as i64,
                table.n_cols() as i64,
                meta.file_type,
                serde_json::to_string(&meta.processing_log)?,
                meta.owner_email,
                serde_json::to_string(&meta.tags)?,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;
        tracing::info!("Dataset saved with ID: {}", id);
        Ok(id)
    }

    fn load_dataset(&self, id: i64) -> Result<Option<Table>> {
        let conn = self.conn();
        let fingerprint: Option<String> = conn
            .query_row(
                "SELECT file_hash FROM datasets WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(fingerprint) = fingerprint else {
            return Ok(None);
        };

        let table_name = data_table_name(&fingerprint);
        if !data_table_exists(&conn, &table_name)? {
            return Err(Error::MissingPhysicalTable(table_name));
        }

        read_data_table(&conn, &table_name).map(Some)
    }

    fn get_dataset(&self, id: i64) -> Result<Option<DatasetRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE id = ?1"),
            params![id],
            dataset_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn search_datasets(&self, query: &str, owner_email: &str) -> Result<Vec<DatasetSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DATASET_COLUMNS} FROM datasets
             WHERE (?1 = '' OR user_email = ?1)
             ORDER BY upload_date DESC, id DESC"
        ))?;

        let rows = stmt.query_map(params![owner_email], dataset_from_row)?;
        let records = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        let needle = query.trim().to_lowercase();
        Ok(records
            .into_iter()
            .filter(|r| needle.is_empty() || matches_query(r, &needle))
            .map(DatasetSummary::from)
            .collect())
    }

    fn delete_dataset(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let fingerprint: Option<String> = tx
            .query_row(
                "SELECT file_hash FROM datasets WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(fingerprint) = fingerprint else {
            return Ok(false);
        };

        let table_name = data_table_name(&fingerprint);
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&table_name)))?;
        tx.execute(
            "DELETE FROM processing_history WHERE dataset_id = ?1",
            params![id],
        )?;
        tx.execute("DELETE FROM datasets WHERE id = ?1", params![id])?;

        tx.commit()?;
        tracing::info!("Dataset {} deleted", id);
        Ok(true)
    }

    fn statistics(&self) -> Result<StoreStatistics> {
        let conn = self.conn();
        let (total_datasets, total_size_bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM datasets",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt =
            conn.prepare("SELECT file_type, COUNT(*) FROM datasets GROUP BY file_type")?;
        let by_type = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?;
        let datasets_by_type: BTreeMap<String, i64> =
            by_type.collect::<std::result::Result<_, _>>()?;

        let cutoff = format_datetime(&(Utc::now() - Duration::days(RECENT_UPLOAD_DAYS)));
        let recent_uploads: i64 = conn.query_row(
            "SELECT COUNT(*) FROM datasets WHERE upload_date >= ?1",
            params![cutoff],
            |row| row.get(0),
        )?;

        Ok(StoreStatistics {
            total_datasets,
            total_size_bytes,
            datasets_by_type,
            recent_uploads,
        })
    }

    // Processing history

    fn log_operation(
        &self,
        dataset_id: i64,
        operation: &str,
        parameters: &serde_json::Value,
        actor_email: &str,
    ) -> Result<i64> {
        let conn = self.conn();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM datasets WHERE id = ?1",
                params![dataset_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(Error::NotFound);
        }

        conn.execute(
            "INSERT INTO processing_history (dataset_id, operation, parameters, timestamp, user_email)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                dataset_id,
                operation,
                serde_json::to_string(parameters)?,
                format_datetime(&Utc::now()),
                actor_email,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_history(&self, dataset_id: i64) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, dataset_id, operation, parameters, timestamp, user_email
             FROM processing_history WHERE dataset_id = ?1
             ORDER BY timestamp DESC, id DESC",
        )?;

        let rows = stmt.query_map(params![dataset_id], |row| {
            let raw: String = row.get(3)?;
            Ok(HistoryEntry {
                id: row.get(0)?,
                dataset_id: row.get(1)?,
                operation: row.get(2)?,
                parameters: serde_json::from_str(&raw).unwrap_or_else(|e| {
                    tracing::warn!("Invalid JSON in processing_history.parameters: {}", e);
                    serde_json::Value::Object(Default::default())
                }),
                timestamp: parse_datetime(&row.get::<_, String>(4)?),
                actor_email: row.get(5)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Session log

    fn start_session(&self, user_email: &str) -> Result<Session> {
        let now = Utc::now();
        let session_id = Uuid::new_v4().to_string();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO user_sessions (session_id, user_email, start_time, last_activity)
             VALUES (?1, ?2, ?3, ?3)",
            params![session_id, user_email, format_datetime(&now)],
        )?;

        Ok(Session {
            id: conn.last_insert_rowid(),
            session_id,
            user_email: user_email.to_string(),
            started_at: now,
            last_activity_at: now,
            datasets_processed: 0,
        })
    }

    fn record_session_activity(&self, session_id: &str, datasets_processed: i64) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE user_sessions
             SET last_activity = ?1, datasets_processed = datasets_processed + ?2
             WHERE session_id = ?3",
            params![format_datetime(&Utc::now()), datasets_processed, session_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, session_id, user_email, start_time, last_activity, datasets_processed
             FROM user_sessions WHERE session_id = ?1",
            params![session_id],
            session_from_row,
        )
        .optional()
        .map_err(Error::from)
    }
}

fn matches_query(record: &DatasetRecord, needle: &str) -> bool {
    record.name.to_lowercase().contains(needle)
        || record.description.to_lowercase().contains(needle)
        || record
            .tags
            .iter()
            .any(|t| t.to_lowercase().contains(needle))
}
