use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the connection to the relay is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connect, then upgrade with STARTTLS. The upgrade is mandatory.
    #[default]
    Starttls,
    /// TLS from the first byte (SMTPS, usually port 465).
    Tls,
    /// No encryption. Only for local relays.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    /// Envelope sender and `From` address; also the login name.
    pub sender: String,
    /// Empty means no authentication.
    pub password: String,
    pub company_name: String,
    /// Allow a password over a connection with `security = "none"`. Off by
    /// default, so such a password is refused unless this is set.
    pub allow_plaintext_auth: bool,
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            security: SmtpSecurity::Starttls,
            sender: "dwap@localhost".to_string(),
            password: String::new(),
            company_name: "DWAP".to_string(),
            allow_plaintext_auth: false,
            timeout_secs: 30,
        }
    }
}

impl SmtpConfig {
    /// Apply `DWAP_SMTP_HOST`, `DWAP_SMTP_PORT`, `EMAIL_USER` and
    /// `EMAIL_PASSWORD` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DWAP_SMTP_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DWAP_SMTP_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("DWAP_SMTP_PORT is not a port: '{port}'")))?;
        }
        if let Some(user) = lookup("EMAIL_USER") {
            self.sender = user;
        }
        if let Some(password) = lookup("EMAIL_PASSWORD") {
            self.password = password;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("smtp.host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("smtp.port cannot be 0".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("smtp.timeout_secs must be positive".to_string()));
        }
        if self.security == SmtpSecurity::None
            && !self.password.is_empty()
            && !self.allow_plaintext_auth
        {
            return Err(Error::Config(
                "smtp.password needs smtp.security other than \"none\" \
                 (or smtp.allow_plaintext_auth = true)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DWAP_SMTP_HOST", "relay.example.com"),
            ("DWAP_SMTP_PORT", "2525"),
            ("EMAIL_USER", "reports@example.com"),
            ("EMAIL_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = SmtpConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.host, "relay.example.com");
        assert_eq!(config.port, 2525);
        assert_eq!(config.sender, "reports@example.com");
        assert_eq!(config.password, "secret");
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = SmtpConfig::default();
        let result = config.apply_overrides(|k| (k == "DWAP_SMTP_PORT").then(|| "smtp".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_security_parses_from_toml() {
        let config: SmtpConfig = toml::from_str("security = \"none\"\nport = 2525").unwrap();
        assert_eq!(config.security, SmtpSecurity::None);
        assert_eq!(config.port, 2525);

        let config: SmtpConfig = toml::from_str("").unwrap();
        assert_eq!(config.security, SmtpSecurity::Starttls);
        assert!(toml::from_str::<SmtpConfig>("security = \"ssl\"").is_err());
    }

    #[test]
    fn test_plaintext_password_needs_opt_in() {
        let mut config = SmtpConfig {
            security: SmtpSecurity::None,
            password: "secret".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.allow_plaintext_auth = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(SmtpConfig::default().validate().is_ok());
        let config = SmtpConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
