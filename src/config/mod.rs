mod smtp;

pub use smtp::{SmtpConfig, SmtpSecurity};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file looked up inside the data directory.
pub const CONFIG_FILE: &str = "dwap.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the database and the default config file. Set
    /// from the command line, never from the file.
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub smtp: SmtpConfig,
    /// When set, outgoing mail is written here as `.eml` files instead of
    /// being sent.
    pub outbox_dir: Option<PathBuf>,
}

impl AppConfig {
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("dwap.db")
    }

    /// Read `explicit` or `<data_dir>/dwap.toml`, then apply environment
    /// overrides. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE));

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let parsed: AppConfig = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            tracing::debug!("Loaded configuration from {}", path.display());
            parsed
        } else if explicit.is_some() {
            return Err(Error::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        } else {
            AppConfig::default()
        };

        config.data_dir = data_dir.to_path_buf();
        config.smtp.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.smtp.validate()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            smtp: SmtpConfig::default(),
            outbox_dir: None,
        }
    }
}
