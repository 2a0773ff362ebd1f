use std::io::Cursor;

use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};

use crate::error::{Error, Result};
use crate::table::{Table, Value, is_null_token};

/// Largest float that still converts to `i64` exactly.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// First worksheet of an `.xlsx` or `.xls` workbook, first row as headers.
pub(super) fn load_excel(bytes: &[u8]) -> Result<(Table, String)> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::Parse(format!("invalid workbook: {e}")))?;

    let sheets = workbook.sheet_names();
    let Some(sheet) = sheets.first().cloned() else {
        return Err(Error::Parse("workbook has no sheets".to_string()));
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| Error::Parse(format!("cannot read sheet '{sheet}': {e}")))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(Error::Parse(format!("sheet '{sheet}' is empty")));
    };
    let headers: Vec<String> = header_row.iter().map(header_text).collect();
    let mut cells: Vec<Vec<Value>> = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<Value>>())
        .filter(|row| row.iter().any(|v| !v.is_null()))
        .collect();
    demote_integral_columns(&mut cells, headers.len());

    let note = if sheets.len() > 1 {
        tracing::info!("Multiple sheets found. Using sheet: {}", sheet);
        format!("Successfully loaded Excel file (sheet '{sheet}' of {})", sheets.len())
    } else {
        "Successfully loaded Excel file".to_string()
    };
    Ok((Table::new(headers, cells)?, note))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => (*f as i64).to_string(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) if f.is_finite() => Value::Float(*f),
        Data::Float(_) => Value::Null,
        Data::Bool(b) => Value::Text(if *b { "True" } else { "False" }.to_string()),
        Data::String(s) if is_null_token(s) => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::Text(cell.to_string()),
        },
        other => Value::Text(other.to_string()),
    }
}

/// Spreadsheets store every number as a float; columns holding only whole
/// numbers become integer columns.
fn demote_integral_columns(rows: &mut [Vec<Value>], width: usize) {
    for col in 0..width {
        let mut any = false;
        let integral = rows.iter().all(|row| match &row[col] {
            Value::Null | Value::Int(_) => true,
            Value::Float(f) => {
                any = true;
                f.fract() == 0.0 && f.abs() < MAX_EXACT_INT
            }
            Value::Text(_) => false,
        });
        if !(integral && any) {
            continue;
        }
        for row in rows.iter_mut() {
            if let Value::Float(f) = row[col] {
                row[col] = Value::Int(f as i64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn workbook_bytes(build: impl FnOnce(&mut Workbook)) -> Vec<u8> {
        let mut workbook = Workbook::new();
        build(&mut workbook);
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_first_sheet_with_header_row() {
        let bytes = workbook_bytes(|wb| {
            let sheet = wb.add_worksheet();
            sheet.set_name("Sales").unwrap();
            sheet.write_string(0, 0, "region").unwrap();
            sheet.write_string(0, 1, "units").unwrap();
            sheet.write_string(0, 2, "price").unwrap();
            sheet.write_string(1, 0, "North").unwrap();
            sheet.write_number(1, 1, 12.0).unwrap();
            sheet.write_number(1, 2, 2.5).unwrap();
            sheet.write_string(2, 0, "South").unwrap();
            sheet.write_number(2, 1, 7.0).unwrap();
            sheet.write_number(2, 2, 3.0).unwrap();

            let other = wb.add_worksheet();
            other.write_string(0, 0, "ignored").unwrap();
        });

        let (table, note) = load_excel(&bytes).unwrap();
        assert_eq!(table.headers(), &["region", "units", "price"]);
        assert_eq!(
            table.rows(),
            &[
                vec![Value::Text("North".into()), Value::Int(12), Value::Float(2.5)],
                vec![Value::Text("South".into()), Value::Int(7), Value::Float(3.0)],
            ]
        );
        assert_eq!(note, "Successfully loaded Excel file (sheet 'Sales' of 2)");
    }

    #[test]
    fn test_blank_cells_are_null() {
        let bytes = workbook_bytes(|wb| {
            let sheet = wb.add_worksheet();
            sheet.write_string(0, 0, "a").unwrap();
            sheet.write_string(0, 1, "b").unwrap();
            sheet.write_number(1, 0, 1.0).unwrap();
            sheet.write_string(2, 1, "NA").unwrap();
            sheet.write_number(2, 0, 2.0).unwrap();
        });

        let (table, note) = load_excel(&bytes).unwrap();
        assert_eq!(note, "Successfully loaded Excel file");
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.missing_count(), 2);
        assert_eq!(table.rows()[1][0], Value::Int(2));
    }

    #[test]
    fn test_not_a_workbook() {
        let result = load_excel(b"PK\x03\x04 not really a workbook");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
