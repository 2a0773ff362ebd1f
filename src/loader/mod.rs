//! Turns uploaded bytes of a declared type into a [`Table`].

mod delimited;
mod document;
mod excel;
mod json;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::Table;

pub use delimited::{decode_text, detect_delimiter};

/// Declared type of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Csv,
    Xlsx,
    Xls,
    Json,
    Txt,
    Pdf,
    Docx,
    Doc,
}

impl FileKind {
    pub const ALL: [FileKind; 8] = [
        FileKind::Csv,
        FileKind::Xlsx,
        FileKind::Xls,
        FileKind::Json,
        FileKind::Txt,
        FileKind::Pdf,
        FileKind::Docx,
        FileKind::Doc,
    ];

    /// Accepts a bare extension ("CSV", ".csv") or a file name ("data.csv").
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.trim();
        let ext = ext.rsplit('.').next().unwrap_or(ext).to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == ext)
            .ok_or_else(|| Error::UnsupportedFormat(ext))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        Self::from_extension(ext)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Csv => "csv",
            FileKind::Xlsx => "xlsx",
            FileKind::Xls => "xls",
            FileKind::Json => "json",
            FileKind::Txt => "txt",
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Doc => "doc",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Loaded {
    pub table: Table,
    pub kind: FileKind,
    /// Processing-log line describing how the file was read.
    pub note: String,
}

pub fn load(bytes: &[u8], declared_extension: &str) -> Result<Loaded> {
    let kind = FileKind::from_extension(declared_extension)?;
    let (table, note) = match kind {
        FileKind::Csv => delimited::load_csv(bytes)?,
        FileKind::Txt => delimited::load_text(bytes)?,
        FileKind::Json => json::load_json(bytes)?,
        FileKind::Xlsx | FileKind::Xls => excel::load_excel(bytes)?,
        FileKind::Pdf => document::load_pdf(bytes)?,
        // legacy .doc only loads when it is really an OOXML package
        FileKind::Docx | FileKind::Doc => document::load_docx(bytes)?,
    };
    tracing::debug!(
        "Loaded {kind} input: {} rows x {} columns",
        table.n_rows(),
        table.n_cols()
    );
    Ok(Loaded { table, kind, note })
}

pub fn load_path(path: &Path) -> Result<Loaded> {
    let kind = FileKind::from_path(path)?;
    let bytes = std::fs::read(path)?;
    load(&bytes, kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(FileKind::from_extension("CSV").unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_extension(".json").unwrap(), FileKind::Json);
        assert_eq!(
            FileKind::from_extension("report.final.DOCX").unwrap(),
            FileKind::Docx
        );
        assert!(matches!(
            FileKind::from_extension("parquet"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_reports_corrupt_binary_formats() {
        for ext in ["xlsx", "xls", "pdf", "docx", "doc"] {
            let result = load(b"PK\x03\x04", ext);
            assert!(matches!(result, Err(Error::Parse(_))), "{ext}");
        }
    }

    #[test]
    fn test_load_xlsx() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "city").unwrap();
        sheet.write_string(1, 0, "Lima").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let loaded = load(&bytes, "xlsx").unwrap();
        assert_eq!(loaded.kind, FileKind::Xlsx);
        assert_eq!(loaded.table.headers(), &["city"]);
        assert_eq!(loaded.note, "Successfully loaded Excel file");
    }

    #[test]
    fn test_load_csv() {
        let loaded = load(b"a,b\n1,x\n2,y\n", "csv").unwrap();
        assert_eq!(loaded.kind, FileKind::Csv);
        assert_eq!(loaded.table.n_rows(), 2);
        assert_eq!(loaded.note, "Successfully loaded CSV with utf-8 encoding");
    }
}
