//! Mail delivery.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use lettre::address::{Address, Envelope};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::extension::ClientId;
use lettre::{SmtpTransport, Transport};
use uuid::Uuid;

use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::{Error, Result};

/// Delivers one rendered message to one recipient.
pub trait Mailer: Send + Sync {
    fn deliver(&self, from: &str, to: &str, message: &str) -> Result<()>;
}

/// SMTP relay client. STARTTLS is required unless the configuration says
/// otherwise.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let config = &self.config;
        let builder = match config.security {
            SmtpSecurity::Starttls => SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| delivery(format!("cannot set up TLS for {}: {}", config.host, e)))?,
            SmtpSecurity::Tls => SmtpTransport::relay(&config.host)
                .map_err(|e| delivery(format!("cannot set up TLS for {}: {}", config.host, e)))?,
            SmtpSecurity::None => SmtpTransport::builder_dangerous(&config.host),
        };
        let mut builder = builder
            .port(config.port)
            .hello_name(ClientId::Domain("localhost".to_string()))
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if !config.password.is_empty() {
            if config.security == SmtpSecurity::None && !config.allow_plaintext_auth {
                return Err(delivery(
                    "refusing to send credentials over an unencrypted connection; \
                     set smtp.allow_plaintext_auth to permit it"
                        .to_string(),
                ));
            }
            builder = builder.credentials(Credentials::new(
                config.sender.clone(),
                config.password.clone(),
            ));
        }
        Ok(builder.build())
    }
}

fn delivery(message: String) -> Error {
    Error::Delivery(message)
}

fn address(raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| delivery(format!("invalid address '{raw}': {e}")))
}

/// Normalise line endings to CRLF. The transport adds the terminating dot
/// line and escapes leading dots.
fn crlf_lines(message: &str) -> String {
    message
        .trim_end_matches(['\r', '\n'])
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\r\n")
}

impl Mailer for SmtpMailer {
    fn deliver(&self, from: &str, to: &str, message: &str) -> Result<()> {
        let transport = self.transport()?;
        let envelope = Envelope::new(Some(address(from)?), vec![address(to)?])
            .map_err(|e| delivery(format!("invalid envelope: {e}")))?;

        transport
            .send_raw(&envelope, crlf_lines(message).as_bytes())
            .map_err(|e| match e.status() {
                Some(code) => delivery(format!("relay answered {code}: {e}")),
                None => delivery(format!(
                    "cannot deliver through {}:{}: {}",
                    self.config.host, self.config.port, e
                )),
            })?;

        tracing::info!("Email sent successfully to {}", to);
        Ok(())
    }
}

/// Writes each message into a directory as an `.eml` file.
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Mailer for OutboxMailer {
    fn deliver(&self, _from: &str, to: &str, message: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| delivery(format!("cannot create outbox {}: {}", self.dir.display(), e)))?;
        let name = format!(
            "{}-{}.eml",
            Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
            Uuid::new_v4().simple()
        );
        let path = self.dir.join(name);
        fs::write(&path, message)
            .map_err(|e| delivery(format!("cannot write {}: {}", path.display(), e)))?;

        tracing::info!("Email to {} written to {}", to, path.display());
        Ok(())
    }
}
