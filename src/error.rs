use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("not found")]
    NotFound,

    #[error("data table {0} is missing for an existing dataset")]
    MissingPhysicalTable(String),

    #[error("identical content is already stored as dataset {existing_id}")]
    DuplicateContent { existing_id: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg) => match err.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::ReadOnly
                | ErrorCode::SystemIoFailure => Error::StorageUnavailable(
                    msg.clone().unwrap_or_else(|| err.to_string()),
                ),
                ErrorCode::ConstraintViolation => {
                    Error::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
                }
                _ => Error::Database(e),
            },
            _ => Error::Database(e),
        }
    }
}

impl Error {
    /// True when nothing was written because the backend could not be reached.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
