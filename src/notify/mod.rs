//! Exporting tables and mailing them out.

mod export;
mod message;
mod transport;

pub use export::{ExportFormat, ExportedFile, SHEET_NAME, export};
pub use message::{AnalysisReport, Message, Part, ProcessedDataMeta};
pub use transport::{Mailer, OutboxMailer, SmtpMailer};

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::config::{AppConfig, SmtpConfig};
use crate::error::{Error, Result};
use crate::table::Table;

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map_err(|e| tracing::error!("email pattern failed to compile: {}", e))
        .ok()
});

#[must_use]
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

fn require_valid(recipient: &str) -> Result<()> {
    if validate_email(recipient) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "'{recipient}' is not a valid email address"
        )))
    }
}

/// Builds the three kinds of outgoing mail and hands them to a [`Mailer`].
pub struct Notifier {
    smtp: SmtpConfig,
    mailer: Box<dyn Mailer>,
}

impl Notifier {
    pub fn new(smtp: SmtpConfig, mailer: Box<dyn Mailer>) -> Self {
        Self { smtp, mailer }
    }

    /// Outbox delivery when `outbox_dir` is configured, SMTP otherwise.
    pub fn from_config(config: &AppConfig) -> Self {
        let mailer: Box<dyn Mailer> = match &config.outbox_dir {
            Some(dir) => Box::new(OutboxMailer::new(dir)),
            None => Box::new(SmtpMailer::new(config.smtp.clone())),
        };
        Self::new(config.smtp.clone(), mailer)
    }

    fn send(&self, recipient: &str, message: Message) -> Result<()> {
        let raw = message.render();
        self.mailer
            .deliver(&self.smtp.sender, recipient, &raw)
            .inspect_err(|e| tracing::error!("Error sending email to {}: {}", recipient, e))
    }

    /// Mail `table` as an attachment with an HTML summary and a plain-text
    /// report.
    pub fn send_processed_data(
        &self,
        recipient: &str,
        table: &Table,
        meta: &ProcessedDataMeta,
        format: ExportFormat,
    ) -> Result<()> {
        require_valid(recipient)?;
        let company = &self.smtp.company_name;
        let sender = &self.smtp.sender;
        let now = Utc::now();

        let base_name = if meta.filename.trim().is_empty() {
            "processed_data"
        } else {
            meta.filename.as_str()
        };
        let attachment = export(table, format, base_name)?;

        let message = Message::new(sender, recipient, &format!("Processed Data from {company}"))
            .part(Part::Html(message::processed_data_html(
                company,
                sender,
                meta,
                table,
                format.as_str(),
                now,
            )))
            .part(Part::Attachment(attachment))
            .part(Part::Text(message::summary_report(
                company, sender, meta, table, now,
            )));

        self.send(recipient, message)
    }

    pub fn send_analysis_report(&self, recipient: &str, report: &AnalysisReport) -> Result<()> {
        require_valid(recipient)?;
        let company = &self.smtp.company_name;
        let sender = &self.smtp.sender;

        let message = Message::new(
            sender,
            recipient,
            &format!("Data Analysis Report from {company}"),
        )
        .part(Part::Html(message::analysis_html(company, sender, report)));

        self.send(recipient, message)
    }

    pub fn send_notification(&self, recipient: &str, subject: &str, text: &str) -> Result<()> {
        require_valid(recipient)?;
        let company = &self.smtp.company_name;
        let sender = &self.smtp.sender;

        let message = Message::new(sender, recipient, &format!("{subject} - {company}"))
            .part(Part::Html(message::notification_html(company, sender, text)));

        self.send(recipient, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    use crate::table::Value;

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Mailer for Recorder {
        fn deliver(&self, _from: &str, to: &str, message: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct Failing;

    impl Mailer for Failing {
        fn deliver(&self, _from: &str, _to: &str, _message: &str) -> Result<()> {
            Err(Error::Delivery("connection refused".to_string()))
        }
    }

    fn table() -> Table {
        Table::new(
            vec!["a".into()],
            vec![vec![Value::Int(1)], vec![Value::Int(2)]],
        )
        .unwrap()
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana.b+tag@example.co.za"));
        assert!(!validate_email("ana@example"));
        assert!(!validate_email("not an email"));
        assert!(!validate_email("a@b.c"));
        assert!(!validate_email(""));
    }

    #[test]
    fn test_invalid_recipient_rejected_before_sending() {
        let recorder = Recorder::default();
        let notifier = Notifier::new(SmtpConfig::default(), Box::new(recorder.clone()));

        let result = notifier.send_notification("nope", "Hi", "msg");
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_processed_data_message() {
        let recorder = Recorder::default();
        let notifier = Notifier::new(
            SmtpConfig {
                company_name: "Acme".to_string(),
                ..Default::default()
            },
            Box::new(recorder.clone()),
        );

        let meta = ProcessedDataMeta {
            filename: "sales.csv".to_string(),
            ..Default::default()
        };
        notifier
            .send_processed_data("ana@example.com", &table(), &meta, ExportFormat::Json)
            .unwrap();

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ana@example.com");
        assert!(sent[0].1.contains("Subject: Processed Data from Acme\r\n"));
        assert!(sent[0].1.contains("filename=\"sales.json\""));
        assert!(sent[0].1.contains("Content-Type: text/plain"));
    }

    #[test]
    fn test_transport_failure_is_surfaced() {
        let notifier = Notifier::new(SmtpConfig::default(), Box::new(Failing));
        let result = notifier.send_analysis_report("ana@example.com", &AnalysisReport::default());
        assert!(matches!(result, Err(Error::Delivery(_))));
    }

    #[test]
    fn test_from_config_uses_outbox() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            data_dir: temp.path().to_path_buf(),
            outbox_dir: Some(temp.path().join("outbox")),
            ..Default::default()
        };
        let notifier = Notifier::from_config(&config);
        notifier
            .send_notification("ana@example.com", "Upload finished", "All done")
            .unwrap();

        let count = fs::read_dir(temp.path().join("outbox")).unwrap().count();
        assert_eq!(count, 1);
    }
}
