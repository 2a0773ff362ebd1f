use docx_rs::{DocumentChild, ParagraphChild, RunChild, read_docx};
use lopdf::Document;

use crate::error::{Error, Result};
use crate::table::{Table, Value};

/// One row per page: `page` (1-based) and its extracted `text`.
pub(super) fn load_pdf(bytes: &[u8]) -> Result<(Table, String)> {
    let document =
        Document::load_mem(bytes).map_err(|e| Error::Parse(format!("invalid PDF: {e}")))?;

    let pages = document.get_pages();
    let rows: Vec<Vec<Value>> = pages
        .keys()
        .map(|&number| {
            let text = document.extract_text(&[number]).unwrap_or_else(|e| {
                tracing::warn!("No text extracted from PDF page {}: {}", number, e);
                String::new()
            });
            vec![
                Value::Int(i64::from(number)),
                Value::Text(text.trim().to_string()),
            ]
        })
        .collect();

    let note = format!("Extracted text from {} PDF pages", rows.len());
    let table = Table::new(vec!["page".to_string(), "text".to_string()], rows)?;
    Ok((table, note))
}

/// One row per non-blank body paragraph: `paragraph_number` counts every
/// paragraph, blank ones included.
pub(super) fn load_docx(bytes: &[u8]) -> Result<(Table, String)> {
    let docx = read_docx(bytes).map_err(|e| Error::Parse(format!("invalid DOCX: {e}")))?;

    let mut rows = Vec::new();
    let paragraphs = docx.document.children.iter().filter_map(|child| match child {
        DocumentChild::Paragraph(p) => Some(p),
        _ => None,
    });
    for (i, paragraph) in paragraphs.enumerate() {
        let mut text = String::new();
        collect_text(&paragraph.children, &mut text);
        let text = text.trim();
        if !text.is_empty() {
            rows.push(vec![Value::Int(i as i64 + 1), Value::Text(text.to_string())]);
        }
    }

    let note = format!("Extracted {} paragraphs from DOCX", rows.len());
    let table = Table::new(
        vec!["paragraph_number".to_string(), "text".to_string()],
        rows,
    )?;
    Ok((table, note))
}

fn collect_text(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for item in &run.children {
                    match item {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push('\t'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_text(&link.children, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use docx_rs::{Docx, Paragraph, Run};

    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = Docx::new();
        for text in paragraphs {
            let mut paragraph = Paragraph::new();
            if !text.is_empty() {
                paragraph = paragraph.add_run(Run::new().add_text(*text));
            }
            docx = docx.add_paragraph(paragraph);
        }
        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = docx_bytes(&["Quarterly notes", "", "  Revenue grew  "]);
        let (table, note) = load_docx(&bytes).unwrap();

        assert_eq!(table.headers(), &["paragraph_number", "text"]);
        assert_eq!(
            table.rows(),
            &[
                vec![Value::Int(1), Value::Text("Quarterly notes".into())],
                vec![Value::Int(3), Value::Text("Revenue grew".into())],
            ]
        );
        assert_eq!(note, "Extracted 2 paragraphs from DOCX");
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(load_docx(b"plain text"), Err(Error::Parse(_))));
        assert!(matches!(load_pdf(b"plain text"), Err(Error::Parse(_))));
    }
}
