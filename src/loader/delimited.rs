use crate::error::{Error, Result};
use crate::table::Table;

const TEXT_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Decode as UTF-8 (dropping a BOM), falling back to Latin-1 which never fails.
pub fn decode_text(bytes: &[u8]) -> (String, &'static str) {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), "utf-8"),
        Err(_) => (bytes.iter().map(|&b| b as char).collect(), "latin-1"),
    }
}

/// First of `, \t ; |` present in the first line.
pub fn detect_delimiter(content: &str) -> Option<u8> {
    let first = content.lines().next()?;
    TEXT_DELIMITERS
        .into_iter()
        .find(|d| first.as_bytes().contains(d))
}

pub(super) fn load_csv(bytes: &[u8]) -> Result<(Table, String)> {
    let (content, encoding) = decode_text(bytes);
    let table = parse_delimited(&content, b',')?;
    Ok((table, format!("Successfully loaded CSV with {encoding} encoding")))
}

pub(super) fn load_text(bytes: &[u8]) -> Result<(Table, String)> {
    let (content, _) = decode_text(bytes);
    let delimiter = if content.lines().nth(1).is_some() {
        detect_delimiter(&content)
    } else {
        None
    };

    if let Some(delimiter) = delimiter {
        let table = parse_delimited(&content, delimiter)?;
        let shown = if delimiter == b'\t' {
            "\\t".to_string()
        } else {
            (delimiter as char).to_string()
        };
        return Ok((table, format!("Loaded text file with delimiter: {shown}")));
    }

    let rows = content.lines().map(|l| vec![l.to_string()]).collect();
    let table = Table::from_text_rows(vec!["text".to_string()], rows);
    Ok((table, "Loaded text file as single column".to_string()))
}

fn parse_delimited(content: &str, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Parse(format!("reading header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(Error::Parse("no columns found".to_string()));
    }

    let mut rows = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::Parse(format!("row {row_no}: {e}")))?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::from_text_rows(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnType, Value};

    #[test]
    fn test_latin1_fallback() {
        let (text, encoding) = decode_text(b"caf\xe9");
        assert_eq!(text, "café");
        assert_eq!(encoding, "latin-1");
    }

    #[test]
    fn test_bom_is_stripped() {
        let (table, _) = load_csv(b"\xef\xbb\xbfid,name\n1,a\n").unwrap();
        assert_eq!(table.headers()[0], "id");
    }

    #[test]
    fn test_csv_skips_blank_lines() {
        let (table, _) = load_csv(b"a,b\n1,2\n\n3,4\n").unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column_type(0), ColumnType::Integer);
    }

    #[test]
    fn test_text_with_delimiter() {
        let (table, note) = load_text(b"a;b\n1;2\n3;4").unwrap();
        assert_eq!(table.headers(), &["a", "b"]);
        assert_eq!(table.rows()[1][1], Value::Int(4));
        assert_eq!(note, "Loaded text file with delimiter: ;");
    }

    #[test]
    fn test_text_without_delimiter() {
        let (table, note) = load_text(b"hello world\nsecond line").unwrap();
        assert_eq!(table.headers(), &["text"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(note, "Loaded text file as single column");
    }

    #[test]
    fn test_detect_delimiter_order() {
        assert_eq!(detect_delimiter("a\tb,c"), Some(b','));
        assert_eq!(detect_delimiter("a|b"), Some(b'|'));
        assert_eq!(detect_delimiter("plain"), None);
    }
}
