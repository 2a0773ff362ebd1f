//! MIME assembly and the mail bodies.

use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::export::{ExportedFile, escape_markup};
use crate::table::Table;

const BASE64_LINE: usize = 76;

/// One MIME part of a `multipart/mixed` message.
#[derive(Debug, Clone)]
pub enum Part {
    Html(String),
    Text(String),
    Attachment(ExportedFile),
}

#[derive(Debug, Clone)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(from: &str, to: &str, subject: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            date: Utc::now(),
            parts: Vec::new(),
        }
    }

    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Render with CRLF line endings.
    pub fn render(&self) -> String {
        let boundary = format!("=_dwap_{}", Uuid::new_v4().simple());
        let domain = self.from.rsplit_once('@').map_or("localhost", |(_, d)| d);

        let mut out = String::new();
        let _ = write!(out, "From: {}\r\n", header_value(&self.from));
        let _ = write!(out, "To: {}\r\n", header_value(&self.to));
        let _ = write!(out, "Subject: {}\r\n", encode_subject(&self.subject));
        let _ = write!(out, "Date: {}\r\n", self.date.to_rfc2822());
        let _ = write!(out, "Message-ID: <{}@{}>\r\n", Uuid::new_v4(), domain);
        out.push_str("MIME-Version: 1.0\r\n");
        let _ = write!(
            out,
            "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
        );
        out.push_str("This is a multi-part message in MIME format.\r\n");

        for part in &self.parts {
            let _ = write!(out, "\r\n--{boundary}\r\n");
            match part {
                Part::Html(body) => {
                    out.push_str("Content-Type: text/html; charset=\"utf-8\"\r\n");
                    out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
                    out.push_str(&wrap_base64(body.as_bytes()));
                }
                Part::Text(body) => {
                    out.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
                    out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
                    out.push_str(&wrap_base64(body.as_bytes()));
                }
                Part::Attachment(file) => {
                    let name = header_value(&file.file_name).replace('"', "");
                    let _ = write!(
                        out,
                        "Content-Type: {}; name=\"{name}\"\r\n",
                        file.mime_type
                    );
                    out.push_str("Content-Transfer-Encoding: base64\r\n");
                    let _ = write!(
                        out,
                        "Content-Disposition: attachment; filename=\"{name}\"\r\n\r\n"
                    );
                    out.push_str(&wrap_base64(&file.bytes));
                }
            }
        }
        let _ = write!(out, "\r\n--{boundary}--\r\n");
        out
    }
}

/// Drop CR/LF so caller-supplied values cannot inject headers.
fn header_value(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

fn encode_subject(subject: &str) -> String {
    let clean = header_value(subject);
    if clean.is_ascii() {
        clean
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(clean.as_bytes()))
    }
}

pub(crate) fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE * 2 + 2);
    for chunk in encoded.as_bytes().chunks(BASE64_LINE) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

const STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; } \
    .header { color: white; padding: 20px; text-align: center; } \
    .content { padding: 20px; } \
    .footer { background-color: #ecf0f1; padding: 15px; text-align: center; font-size: 12px; } \
    table { border-collapse: collapse; width: 100%; margin: 15px 0; } \
    th, td { border: 1px solid #ddd; padding: 8px; text-align: left; } \
    th { background-color: #f2f2f2; }";

fn page(company: &str, sender: &str, colour: &str, heading: &str, content: &str) -> String {
    let company = escape_markup(company);
    format!(
        "<html>\n<head><style>{STYLE}</style></head>\n<body>\n\
         <div class=\"header\" style=\"background-color: {colour};\">\
         <h1>{company}</h1><h2>{heading}</h2></div>\n\
         <div class=\"content\">\n{content}\n</div>\n\
         <div class=\"footer\"><p><strong>{company}</strong><br>Email: {}</p></div>\n\
         </body>\n</html>\n",
        escape_markup(sender)
    )
}

/// Facts about a processed dataset shown in the mail body and report.
#[derive(Debug, Clone, Default)]
pub struct ProcessedDataMeta {
    pub filename: String,
    pub original_rows: Option<usize>,
    pub operations: Vec<String>,
}

pub fn processed_data_html(
    company: &str,
    sender: &str,
    meta: &ProcessedDataMeta,
    table: &Table,
    format: &str,
    now: DateTime<Utc>,
) -> String {
    let original = meta
        .original_rows
        .map_or_else(|| "N/A".to_string(), |n| n.to_string());
    let operations: String = meta
        .operations
        .iter()
        .map(|op| format!("<li>{}</li>", escape_markup(op)))
        .collect();

    let content = format!(
        "<p>Dear Valued Client,</p>\n\
         <p>Your data has been successfully processed. Please find the processed data attached to this email.</p>\n\
         <h3>Processing Summary</h3>\n<table>\n\
         <tr><th>Dataset Name</th><td>{}</td></tr>\n\
         <tr><th>Original Rows</th><td>{original}</td></tr>\n\
         <tr><th>Processed Rows</th><td>{}</td></tr>\n\
         <tr><th>Columns</th><td>{}</td></tr>\n\
         <tr><th>Processing Date</th><td>{}</td></tr>\n\
         <tr><th>File Format</th><td>{}</td></tr>\n</table>\n\
         <h3>Processing Operations Applied:</h3>\n<ul>{operations}</ul>\n\
         <p>Thank you for choosing {} for your data processing needs.</p>",
        escape_markup(&meta.filename),
        table.n_rows(),
        table.n_cols(),
        now.format("%Y-%m-%d %H:%M:%S"),
        format.to_uppercase(),
        escape_markup(company),
    );
    page(company, sender, "#2c3e50", "Data Processing Complete", &content)
}

/// Plain-text report sent alongside processed data.
pub fn summary_report(
    company: &str,
    sender: &str,
    meta: &ProcessedDataMeta,
    table: &Table,
    now: DateTime<Utc>,
) -> String {
    let summary = table.summary();
    let mut out = String::new();
    let _ = writeln!(out, "DATA PROCESSING SUMMARY REPORT");
    let _ = writeln!(out, "{company}");
    let _ = writeln!(out, "Generated: {}", now.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);
    let _ = writeln!(out, "DATASET INFORMATION:");
    let _ = writeln!(out, "- Name: {}", meta.filename);
    let _ = writeln!(
        out,
        "- Original Rows: {}",
        meta.original_rows.unwrap_or(summary.rows)
    );
    let _ = writeln!(out, "- Final Rows: {}", summary.rows);
    let _ = writeln!(out, "- Columns: {}", summary.columns);
    let _ = writeln!(
        out,
        "- Size: {:.2} KB",
        summary.estimated_bytes as f64 / 1024.0
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "COLUMN INFORMATION:");
    for profile in &summary.column_profiles {
        let _ = writeln!(out, "- {}: {}", profile.name, profile.dtype.as_str());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "DATA QUALITY:");
    let _ = writeln!(out, "- Missing Values: {}", summary.missing_values);
    let _ = writeln!(out, "- Duplicate Rows: {}", summary.duplicate_rows);
    let _ = writeln!(out, "- Unique Values per Column:");
    for profile in &summary.column_profiles {
        let _ = writeln!(out, "  - {}: {}", profile.name, profile.unique);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "PROCESSING OPERATIONS:");
    for op in &meta.operations {
        let _ = writeln!(out, "- {op}");
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "For questions or additional processing needs, contact us at {sender}"
    );
    out
}

/// Headline numbers for an analysis mail.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub summary: String,
    pub total_records: Option<usize>,
    pub quality_score: Option<f64>,
    pub missing_percentage: Option<f64>,
}

pub fn analysis_html(company: &str, sender: &str, report: &AnalysisReport) -> String {
    let na = || "N/A".to_string();
    let summary = if report.summary.trim().is_empty() {
        "Analysis completed successfully.".to_string()
    } else {
        escape_markup(&report.summary)
    };
    let content = format!(
        "<p>Dear Client,</p>\n\
         <p>We have completed the analysis of your data. Here are the key insights:</p>\n\
         <h3>Key Findings</h3>\n<p>{summary}</p>\n\
         <h3>Statistical Overview</h3>\n<ul>\n\
         <li>Total Records Analyzed: {}</li>\n\
         <li>Data Quality Score: {}</li>\n\
         <li>Missing Data Percentage: {}%</li>\n</ul>\n\
         <p>Best regards,<br>The {} Team</p>",
        report.total_records.map_or_else(na, |n| n.to_string()),
        report.quality_score.map_or_else(na, |s| format!("{s:.1}")),
        report.missing_percentage.map_or_else(na, |p| format!("{p:.2}")),
        escape_markup(company),
    );
    page(company, sender, "#27ae60", "Data Analysis Report", &content)
}

pub fn notification_html(company: &str, sender: &str, message: &str) -> String {
    let content = format!(
        "<p>{}</p>\n<p>Best regards,<br>The {} Team</p>",
        escape_markup(message),
        escape_markup(company)
    );
    page(company, sender, "#3498db", "Notification", &content)
}
