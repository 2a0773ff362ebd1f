//! In-memory tabular data.
//!
//! A [`Table`] is a list of unique column names plus row-major cells. Columns
//! are kept homogeneous: any text in a column turns every non-null cell of it
//! into text, and any float in a numeric column promotes its integers.

mod stats;
mod summary;
mod value;

pub use stats::{mean, quantile, sample_std};
pub use summary::{ColumnProfile, DataSummary, NumericSummary};
pub use value::{ColumnType, NULL_TOKENS, Value, is_null_token};

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from typed cells. Every row must have one cell per header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(Error::Validation(format!(
                    "row {i} has {} cells, expected {}",
                    row.len(),
                    headers.len()
                )));
            }
        }
        let mut table = Self {
            headers: unique_headers(headers),
            rows,
        };
        table.normalize();
        Ok(table)
    }

    /// Build a table from raw text cells, inferring one type per column.
    /// Short rows are padded with nulls and long rows are truncated.
    pub fn from_text_rows(headers: Vec<String>, raw: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let kinds: Vec<ColumnType> = (0..width)
            .map(|col| infer_text_column(raw.iter().filter_map(|r| r.get(col))))
            .collect();

        let rows = raw
            .into_iter()
            .map(|r| {
                (0..width)
                    .map(|col| match r.get(col) {
                        Some(cell) => typed_cell(cell, kinds[col]),
                        None => Value::Null,
                    })
                    .collect()
            })
            .collect();

        Self {
            headers: unique_headers(headers),
            rows,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Like [`Table::column_index`] but reports unknown names as a validation error.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::Validation(format!("unknown column '{name}'")))
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| &r[idx])
    }

    #[must_use]
    pub fn column_type(&self, idx: usize) -> ColumnType {
        let mut kind = ColumnType::Empty;
        for value in self.column(idx) {
            match value {
                Value::Null => {}
                Value::Text(_) => return ColumnType::Text,
                Value::Float(_) => kind = ColumnType::Float,
                Value::Int(_) => {
                    if kind == ColumnType::Empty {
                        kind = ColumnType::Integer;
                    }
                }
            }
        }
        kind
    }

    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.n_cols())
            .filter(|&i| self.column_type(i).is_numeric())
            .collect()
    }

    pub fn text_columns(&self) -> Vec<usize> {
        (0..self.n_cols())
            .filter(|&i| self.column_type(i) == ColumnType::Text)
            .collect()
    }

    pub fn numeric_values(&self, idx: usize) -> Vec<Option<f64>> {
        self.column(idx).map(Value::as_f64).collect()
    }

    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.iter())
            .filter(|v| v.is_null())
            .count()
    }

    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        let mut seen = HashSet::new();
        self.rows.iter().filter(|r| !seen.insert(row_key(r))).count()
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|r| keep(r));
    }

    /// Apply `f` to every cell of one column, then re-normalize.
    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        self.normalize();
    }

    /// Append a column. `values` must have one entry per row.
    pub fn push_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::Validation(format!(
                "column '{name}' has {} values, table has {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        let mut headers = self.headers.clone();
        headers.push(name.to_string());
        self.headers = unique_headers(headers);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        self.normalize();
        Ok(())
    }

    /// CSV rendering (header plus rows, nulls as empty fields).
    pub fn to_csv_string(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(ToString::to_string))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Deterministic SHA-256 digest of the CSV rendering.
    pub fn fingerprint(&self) -> Result<String> {
        let rendered = self.to_csv_string()?;
        Ok(hex::encode(Sha256::digest(rendered.as_bytes())))
    }

    /// Size of the CSV rendering in bytes.
    pub fn estimated_size(&self) -> Result<i64> {
        Ok(self.to_csv_string()?.len() as i64)
    }

    fn normalize(&mut self) {
        for col in 0..self.headers.len() {
            match self.column_type(col) {
                ColumnType::Text => {
                    for row in &mut self.rows {
                        if matches!(row[col], Value::Int(_) | Value::Float(_)) {
                            row[col] = Value::Text(row[col].to_string());
                        }
                    }
                }
                ColumnType::Float => {
                    for row in &mut self.rows {
                        if let Value::Int(i) = row[col] {
                            row[col] = Value::Float(i as f64);
                        }
                    }
                }
                ColumnType::Integer | ColumnType::Empty => {}
            }
        }
    }
}

pub(crate) fn row_key(row: &[Value]) -> String {
    row.iter()
        .map(Value::key)
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

fn infer_text_column<'a, I>(cells: I) -> ColumnType
where
    I: Iterator<Item = &'a String>,
{
    let mut kind = ColumnType::Empty;
    for cell in cells {
        if is_null_token(cell) {
            continue;
        }
        let trimmed = cell.trim();
        if trimmed.parse::<i64>().is_ok() {
            if kind == ColumnType::Empty {
                kind = ColumnType::Integer;
            }
        } else if value::parse_float(trimmed).is_some() {
            kind = ColumnType::Float;
        } else {
            return ColumnType::Text;
        }
    }
    kind
}

fn typed_cell(raw: &str, kind: ColumnType) -> Value {
    if is_null_token(raw) {
        return Value::Null;
    }
    let trimmed = raw.trim();
    match kind {
        ColumnType::Integer => trimmed.parse().map(Value::Int).unwrap_or(Value::Null),
        ColumnType::Float => value::parse_float(trimmed)
            .map(Value::Float)
            .unwrap_or(Value::Null),
        ColumnType::Text | ColumnType::Empty => Value::Text(raw.to_string()),
    }
}

/// Column the store keeps beside every table to remember row order. A header
/// with this name is renamed like any other duplicate.
pub const ROW_ORDINAL_COLUMN: &str = "__dwap_row";

/// Make headers unique the way SQLite compares identifiers, ignoring ASCII
/// case, so `Name` and `name` can live in one physical table.
fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(ROW_ORDINAL_COLUMN.to_ascii_lowercase());
    let mut out = Vec::with_capacity(headers.len());
    for (i, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            header
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate.to_ascii_lowercase()) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        seen.insert(candidate.to_ascii_lowercase());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_text_rows_infers_types() {
        let table = Table::from_text_rows(
            strings(&["a", "b", "c"]),
            vec![strings(&["1", "1.5", "x"]), strings(&["2", "", "3"])],
        );

        assert_eq!(table.column_type(0), ColumnType::Integer);
        assert_eq!(table.column_type(1), ColumnType::Float);
        assert_eq!(table.column_type(2), ColumnType::Text);
        assert_eq!(table.rows()[1][1], Value::Null);
        assert_eq!(table.rows()[1][2], Value::Text("3".to_string()));
    }

    #[test]
    fn test_new_normalizes_columns() {
        let table = Table::new(
            strings(&["n", "mixed"]),
            vec![
                vec![Value::Int(1), Value::Int(5)],
                vec![Value::Float(2.5), Value::Text("x".to_string())],
            ],
        )
        .unwrap();

        assert_eq!(table.rows()[0][0], Value::Float(1.0));
        assert_eq!(table.rows()[0][1], Value::Text("5".to_string()));
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let result = Table::new(strings(&["a", "b"]), vec![vec![Value::Int(1)]]);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_unique_headers() {
        let table = Table::from_text_rows(strings(&["a", "a", "", "a"]), vec![]);
        assert_eq!(table.headers(), &["a", "a.1", "Unnamed: 2", "a.2"]);
    }

    #[test]
    fn test_unique_headers_ignore_case() {
        let table = Table::from_text_rows(strings(&["Name", "name", "NAME", "a.1", "A"]), vec![]);
        assert_eq!(table.headers(), &["Name", "name.1", "NAME.2", "a.1", "A"]);

        let table = Table::from_text_rows(strings(&["a", "A", "a.1"]), vec![]);
        assert_eq!(table.headers(), &["a", "A.1", "a.1.1"]);
    }

    #[test]
    fn test_row_ordinal_header_is_renamed() {
        let table = Table::from_text_rows(strings(&["__DWAP_ROW", "v"]), vec![]);
        assert_eq!(table.headers(), &["__DWAP_ROW.1", "v"]);
    }

    #[test]
    fn test_duplicates_and_missing() {
        let table = Table::from_text_rows(
            strings(&["a", "b"]),
            vec![
                strings(&["1", "x"]),
                strings(&["1", "x"]),
                strings(&["2", ""]),
            ],
        );
        assert_eq!(table.duplicate_count(), 1);
        assert_eq!(table.missing_count(), 1);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let build = || {
            Table::from_text_rows(strings(&["a"]), vec![strings(&["1"]), strings(&["2"])])
        };
        assert_eq!(build().fingerprint().unwrap(), build().fingerprint().unwrap());

        let other = Table::from_text_rows(strings(&["a"]), vec![strings(&["1"])]);
        assert_ne!(build().fingerprint().unwrap(), other.fingerprint().unwrap());
    }

    #[test]
    fn test_push_column() {
        let mut table = Table::from_text_rows(strings(&["a"]), vec![strings(&["1"])]);
        table.push_column("a", vec![Value::Float(0.5)]).unwrap();
        assert_eq!(table.headers(), &["a", "a.1"]);
        assert!(table.push_column("c", vec![]).is_err());
    }
}
