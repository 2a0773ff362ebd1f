//! Per-invocation context: configuration, an open store and the session
//! that every history row is attributed to.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::cleaner::{self, CleanOptions};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::loader;
use crate::ml::{self, ModelKind};
use crate::notify::{AnalysisReport, ExportFormat, Notifier, ProcessedDataMeta};
use crate::store::{SqliteStore, Store};
use crate::table::Table;
use crate::types::{DatasetRecord, NewDataset, Session};

#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    /// Defaults to the file name.
    pub name: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
    /// Cleaning applied before the dataset is saved.
    pub clean: Option<CleanOptions>,
}

#[derive(Debug, Clone)]
pub struct Imported {
    pub id: i64,
    pub rows: usize,
    pub columns: usize,
    pub processing_log: Vec<String>,
}

pub struct Workspace {
    config: AppConfig,
    store: Arc<dyn Store>,
    session: Session,
}

impl Workspace {
    /// Open (creating if needed) the database under `config.data_dir` and
    /// start a session for `actor`.
    pub fn open(config: AppConfig, actor: &str) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).map_err(|e| {
            Error::StorageUnavailable(format!("{}: {}", config.data_dir.display(), e))
        })?;
        let store = SqliteStore::new(config.db_path())?;
        store.initialize()?;
        Self::with_store(config, Arc::new(store), actor)
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn Store>, actor: &str) -> Result<Self> {
        let session = store.start_session(actor)?;
        tracing::debug!("Started session {}", session.session_id);
        Ok(Self {
            config,
            store,
            session,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn actor(&self) -> &str {
        &self.session.user_email
    }

    /// Metadata and rows of a stored dataset; unknown ids are `NotFound`.
    pub fn dataset(&self, id: i64) -> Result<(DatasetRecord, Table)> {
        let record = self.store.get_dataset(id)?.ok_or(Error::NotFound)?;
        let table = self.store.load_dataset(id)?.ok_or(Error::NotFound)?;
        Ok((record, table))
    }

    /// Append a history row. Failures are logged and otherwise ignored so
    /// the operation being recorded still succeeds.
    pub fn record(&self, dataset_id: i64, operation: &str, parameters: serde_json::Value) {
        if let Err(e) = self
            .store
            .log_operation(dataset_id, operation, &parameters, self.actor())
        {
            tracing::warn!(
                "Could not record {} for dataset {}: {}",
                operation,
                dataset_id,
                e
            );
        }
    }

    fn touch_session(&self, datasets_processed: i64) {
        if let Err(e) = self
            .store
            .record_session_activity(&self.session.session_id, datasets_processed)
        {
            tracing::warn!("Could not update session activity: {}", e);
        }
    }

    /// Load a file, optionally clean it, and save it as a new dataset.
    pub fn import_file(&self, path: &Path, request: ImportRequest) -> Result<Imported> {
        let loaded = loader::load_path(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let size_bytes = fs::metadata(path).map(|m| m.len() as i64).ok();

        let mut processing_log = vec![loaded.note.clone()];
        let mut table = loaded.table;
        let clean = request.clean.filter(|o| !o.is_noop());
        if let Some(options) = &clean {
            let cleaned = cleaner::apply(&table, options);
            processing_log.extend(cleaned.log);
            table = cleaned.table;
        }

        let meta = NewDataset {
            name: request.name.unwrap_or_else(|| file_name.clone()),
            description: request.description,
            size_bytes,
            file_type: loaded.kind.as_str().to_string(),
            processing_log: processing_log.clone(),
            owner_email: self.actor().to_string(),
            tags: request.tags,
        };
        let id = self.store.save_dataset(&table, &meta)?;

        self.record(
            id,
            "upload",
            json!({
                "file": file_name,
                "file_type": loaded.kind.as_str(),
                "rows": table.n_rows(),
                "columns": table.n_cols(),
            }),
        );
        if let Some(options) = &clean {
            self.record(id, "clean", json!({ "options": options }));
        }
        self.touch_session(1);

        Ok(Imported {
            id,
            rows: table.n_rows(),
            columns: table.n_cols(),
            processing_log,
        })
    }

    /// Save `table` as a new dataset derived from `source`, carrying its
    /// description, type and tags forward and extending its processing log.
    fn save_derived(
        &self,
        source: &DatasetRecord,
        table: &Table,
        name: String,
        log: &[String],
    ) -> Result<Imported> {
        let mut processing_log = source.processing_log.clone();
        processing_log.extend(log.iter().cloned());

        let meta = NewDataset {
            name,
            description: source.description.clone(),
            size_bytes: None,
            file_type: source.file_type.clone(),
            processing_log: processing_log.clone(),
            owner_email: self.actor().to_string(),
            tags: source.tags.clone(),
        };
        let id = self.store.save_dataset(table, &meta)?;
        self.touch_session(1);

        Ok(Imported {
            id,
            rows: table.n_rows(),
            columns: table.n_cols(),
            processing_log,
        })
    }

    /// Clean a stored dataset and save the result as a new dataset whose
    /// processing log extends the source's.
    pub fn clean_dataset(
        &self,
        id: i64,
        options: &CleanOptions,
        name: Option<&str>,
    ) -> Result<Imported> {
        if options.is_noop() {
            return Err(Error::Validation("no cleaning step selected".to_string()));
        }
        let (source, table) = self.dataset(id)?;
        let cleaned = cleaner::apply(&table, options);

        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (cleaned)", source.name));
        let saved = self.save_derived(&source, &cleaned.table, name, &cleaned.log)?;

        self.record(
            saved.id,
            "clean",
            json!({ "source_dataset": id, "options": options, "log": cleaned.log }),
        );
        Ok(saved)
    }

    /// Fit `kind` on a stored dataset and save a copy with a `Predictions`
    /// column as a new dataset.
    pub fn save_predictions(
        &self,
        id: i64,
        kind: ModelKind,
        target: Option<&str>,
        features: &[String],
        name: Option<&str>,
    ) -> Result<Imported> {
        let (source, table) = self.dataset(id)?;
        let predicted = ml::predict_into(&table, target, features, kind)?;

        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (predictions)", source.name));
        let line = format!("Added {} column from {}", ml::PREDICTIONS_COLUMN, kind);
        let saved = self.save_derived(&source, &predicted, name, &[line])?;

        self.record(
            saved.id,
            "predict",
            json!({
                "source_dataset": id,
                "model": kind,
                "target": target,
                "features": features,
            }),
        );
        Ok(saved)
    }

    /// Mail a stored dataset to `recipient` in `format`.
    pub fn email_dataset(&self, id: i64, recipient: &str, format: ExportFormat) -> Result<()> {
        let (record, table) = self.dataset(id)?;
        let meta = ProcessedDataMeta {
            filename: record.name.clone(),
            original_rows: None,
            operations: record.processing_log.clone(),
        };

        Notifier::from_config(&self.config).send_processed_data(recipient, &table, &meta, format)?;
        self.record(
            id,
            "email",
            json!({ "recipient": recipient, "format": format.as_str() }),
        );
        Ok(())
    }

    /// Mail a quality overview of a stored dataset to `recipient`.
    pub fn email_analysis(&self, id: i64, recipient: &str) -> Result<()> {
        let (record, table) = self.dataset(id)?;
        let summary = table.summary();
        let cells = summary.rows * summary.columns;
        let missing_percentage = if cells == 0 {
            0.0
        } else {
            summary.missing_values as f64 / cells as f64 * 100.0
        };

        let report = AnalysisReport {
            summary: format!(
                "{}: {} rows, {} columns, {} duplicate rows.",
                record.name, summary.rows, summary.columns, summary.duplicate_rows
            ),
            total_records: Some(summary.rows),
            quality_score: Some(100.0 - missing_percentage),
            missing_percentage: Some(missing_percentage),
        };

        Notifier::from_config(&self.config).send_analysis_report(recipient, &report)?;
        self.record(
            id,
            "email",
            json!({ "recipient": recipient, "report": "analysis" }),
        );
        Ok(())
    }

    pub fn notify(&self, recipient: &str, subject: &str, text: &str) -> Result<()> {
        Notifier::from_config(&self.config).send_notification(recipient, subject, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::MissingStrategy;
    use tempfile::TempDir;

    fn workspace(temp: &TempDir) -> Workspace {
        let config = AppConfig {
            data_dir: temp.path().join("data"),
            outbox_dir: Some(temp.path().join("outbox")),
            ..Default::default()
        };
        Workspace::open(config, "ana@example.com").unwrap()
    }

    fn write_csv(temp: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = temp.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_import_records_history() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let path = write_csv(&temp, "people.csv", "name,age\nann,20\nann,20\nbob,\n");

        let imported = ws
            .import_file(
                &path,
                ImportRequest {
                    clean: Some(CleanOptions {
                        remove_duplicates: true,
                        handle_missing: true,
                        missing_strategy: MissingStrategy::FillMean,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(imported.rows, 2);
        assert_eq!(
            imported.processing_log,
            vec![
                "Successfully loaded CSV with utf-8 encoding",
                "Removed 1 duplicate rows",
                "Filled missing numeric values with mean",
            ]
        );

        let record = ws.store().get_dataset(imported.id).unwrap().unwrap();
        assert_eq!(record.name, "people.csv");
        assert_eq!(record.file_type, "csv");
        assert_eq!(record.owner_email, "ana@example.com");
        assert_eq!(record.size_bytes, fs::metadata(&path).unwrap().len() as i64);

        let history = ws.store().get_history(imported.id).unwrap();
        let ops: Vec<&str> = history.iter().map(|h| h.operation.as_str()).collect();
        assert_eq!(ops, vec!["clean", "upload"]);

        let session = ws
            .store()
            .get_session(&ws.session().session_id)
            .unwrap()
            .unwrap();
        assert_eq!(session.datasets_processed, 1);
    }

    #[test]
    fn test_import_same_file_twice_is_duplicate() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let path = write_csv(&temp, "a.csv", "x\n1\n2\n");

        let first = ws.import_file(&path, ImportRequest::default()).unwrap();
        let second = ws.import_file(&path, ImportRequest::default());
        assert!(matches!(
            second,
            Err(Error::DuplicateContent { existing_id }) if existing_id == first.id
        ));
    }

    #[test]
    fn test_clean_dataset_creates_new_record() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let path = write_csv(&temp, "t.csv", "name\n  Ann \nBOB\n");
        let source = ws.import_file(&path, ImportRequest::default()).unwrap();

        let cleaned = ws
            .clean_dataset(
                source.id,
                &CleanOptions {
                    standardize_text: true,
                    ..Default::default()
                },
                None,
            )
            .unwrap();

        assert_ne!(cleaned.id, source.id);
        let record = ws.store().get_dataset(cleaned.id).unwrap().unwrap();
        assert_eq!(record.name, "t.csv (cleaned)");
        assert_eq!(
            record.processing_log.last().map(String::as_str),
            Some("Standardized text columns")
        );
        let (_, table) = ws.dataset(cleaned.id).unwrap();
        assert_eq!(table.rows()[0][0].to_string(), "ann");
    }

    #[test]
    fn test_clean_without_steps_rejected() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let result = ws.clean_dataset(1, &CleanOptions::default(), None);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_unknown_dataset_not_found() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        assert!(matches!(ws.dataset(9), Err(Error::NotFound)));
    }

    #[test]
    fn test_record_swallows_failures() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        // unknown dataset: logged and ignored
        ws.record(404, "clean", json!({}));
    }

    #[test]
    fn test_email_dataset_to_outbox() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let path = write_csv(&temp, "a.csv", "x\n1\n");
        let imported = ws.import_file(&path, ImportRequest::default()).unwrap();

        ws.email_dataset(imported.id, "bo@example.com", ExportFormat::Csv)
            .unwrap();

        assert_eq!(fs::read_dir(temp.path().join("outbox")).unwrap().count(), 1);
        let history = ws.store().get_history(imported.id).unwrap();
        assert_eq!(history[0].operation, "email");
        assert_eq!(history[0].parameters["recipient"], "bo@example.com");
    }

    #[test]
    fn test_email_invalid_recipient() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let path = write_csv(&temp, "a.csv", "x\n1\n");
        let imported = ws.import_file(&path, ImportRequest::default()).unwrap();

        let result = ws.email_dataset(imported.id, "bogus", ExportFormat::Csv);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_save_predictions() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let path = write_csv(&temp, "line.csv", "x,y\n1,2\n2,4\n3,6\n4,8\n5,10\n6,12\n");
        let source = ws.import_file(&path, ImportRequest::default()).unwrap();

        let saved = ws
            .save_predictions(
                source.id,
                ModelKind::LinearRegression,
                Some("y"),
                &["x".to_string()],
                None,
            )
            .unwrap();

        assert_eq!(saved.columns, 3);
        let (record, table) = ws.dataset(saved.id).unwrap();
        assert_eq!(record.name, "line.csv (predictions)");
        assert_eq!(table.headers()[2], ml::PREDICTIONS_COLUMN);
        let first = table.rows()[0][2].as_f64().unwrap();
        assert!((first - 2.0).abs() < 1e-6);

        let history = ws.store().get_history(saved.id).unwrap();
        assert_eq!(history[0].operation, "predict");
        assert_eq!(history[0].parameters["model"], "linear_regression");
    }

    #[test]
    fn test_email_analysis_to_outbox() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        let path = write_csv(&temp, "a.csv", "x,y\n1,\n2,3\n");
        let imported = ws.import_file(&path, ImportRequest::default()).unwrap();

        ws.email_analysis(imported.id, "bo@example.com").unwrap();

        let entry = fs::read_dir(temp.path().join("outbox"))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        let mail = fs::read_to_string(entry.path()).unwrap();
        assert!(mail.contains("Subject: Data Analysis Report from DWAP"));
    }
}
