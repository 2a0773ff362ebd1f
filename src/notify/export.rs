//! Table serialisation for download and mail attachments.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::{Table, Value};

/// Worksheet name used in Excel exports.
pub const SHEET_NAME: &str = "Processed_Data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Excel,
    Json,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "excel",
            ExportFormat::Json => "json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xls",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Excel => "application/vnd.ms-excel",
            ExportFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xls" | "xlsx" => Ok(ExportFormat::Excel),
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::Validation(format!(
                "unknown export format '{other}' (expected csv, excel or json)"
            ))),
        }
    }
}

/// A rendered file ready to be written or attached.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

pub fn export(table: &Table, format: ExportFormat, base_name: &str) -> Result<ExportedFile> {
    let bytes = match format {
        ExportFormat::Csv => table.to_csv_string()?.into_bytes(),
        ExportFormat::Json => to_json(table)?.into_bytes(),
        ExportFormat::Excel => to_spreadsheet_xml(table).into_bytes(),
    };

    Ok(ExportedFile {
        file_name: format!("{}.{}", file_stem(base_name), format.extension()),
        mime_type: format.mime_type(),
        bytes,
    })
}

/// Strip any directory part and a trailing extension, falling back to a
/// generic name.
fn file_stem(base_name: &str) -> String {
    let name = base_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(base_name)
        .trim();
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    if stem.is_empty() {
        "processed_data".to_string()
    } else {
        stem.to_string()
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
    }
}

/// Pretty-printed array of records keyed by column name.
fn to_json(table: &Table) -> Result<String> {
    let records: Vec<serde_json::Value> = table
        .rows()
        .iter()
        .map(|row| {
            let record: serde_json::Map<String, serde_json::Value> = table
                .headers()
                .iter()
                .zip(row)
                .map(|(h, v)| (h.clone(), json_value(v)))
                .collect();
            serde_json::Value::Object(record)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

pub(crate) fn escape_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// SpreadsheetML 2003 workbook with a header row and one typed cell per value.
fn to_spreadsheet_xml(table: &Table) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<?mso-application progid=\"Excel.Sheet\"?>\n");
    xml.push_str(
        "<Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\" \
         xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
    );
    let _ = writeln!(xml, " <Worksheet ss:Name=\"{SHEET_NAME}\">");
    xml.push_str("  <Table>\n");

    xml.push_str("   <Row>\n");
    for header in table.headers() {
        let _ = writeln!(
            xml,
            "    <Cell><Data ss:Type=\"String\">{}</Data></Cell>",
            escape_markup(header)
        );
    }
    xml.push_str("   </Row>\n");

    for row in table.rows() {
        xml.push_str("   <Row>\n");
        for value in row {
            match value {
                Value::Null => xml.push_str("    <Cell/>\n"),
                Value::Int(_) | Value::Float(_) => {
                    let _ = writeln!(
                        xml,
                        "    <Cell><Data ss:Type=\"Number\">{value}</Data></Cell>"
                    );
                }
                Value::Text(s) => {
                    let _ = writeln!(
                        xml,
                        "    <Cell><Data ss:Type=\"String\">{}</Data></Cell>",
                        escape_markup(s)
                    );
                }
            }
        }
        xml.push_str("   </Row>\n");
    }

    xml.push_str("  </Table>\n </Worksheet>\n</Workbook>\n");
    xml
}
