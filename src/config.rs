//! Configuration types for the task service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, ServiceError};

/// Top-level configuration for the task service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Task/user store settings.
    pub store: StoreConfig,
    /// Token and password settings.
    pub auth: AuthConfig,
    /// Deadline reminder settings.
    pub reminder: ReminderConfig,
    /// Outbound mail settings.
    pub mail: MailConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (use `0` for auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 5000,
        }
    }
}

/// SQLite store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let root = dirs::data_dir()
            .map(|d| d.join("duenotify"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            db_path: root.join("duenotify.db"),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. `None` means an ephemeral secret is generated
    /// at startup, which invalidates issued tokens on restart.
    pub jwt_secret: Option<String>,
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
    /// Minimum accepted password length at registration.
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: 3600,
            min_password_len: 6,
        }
    }
}

/// Deadline reminder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// IANA timezone used to render deadlines in reminder emails.
    pub timezone: String,
    /// Fraction of the remaining time before the deadline at which the
    /// reminder fires. Must lie in `(0, 1]`.
    pub lead_fraction: f64,
    /// Number of delivery outcomes kept in memory.
    pub outcome_history: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Almaty".to_owned(),
            lead_fraction: 0.7,
            outcome_history: 200,
        }
    }
}

impl ReminderConfig {
    /// Parse the configured timezone.
    pub fn parsed_timezone(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .trim()
            .parse::<chrono_tz::Tz>()
            .map_err(|e| ServiceError::Config(format!("unknown reminder timezone: {e}")))
    }
}

/// SMTP configuration. Without `smtp_host` reminders are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// SMTP relay hostname (e.g. `smtp.gmail.com`).
    pub smtp_host: Option<String>,
    /// SMTP port (STARTTLS).
    pub smtp_port: u16,
    /// SMTP username.
    pub username: Option<String>,
    /// SMTP password or app password.
    pub password: Option<String>,
    /// Sender address; falls back to `username`.
    pub from_address: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
            from_address: None,
        }
    }
}

impl MailConfig {
    /// Sender address, preferring `from_address` over `username`.
    pub fn sender(&self) -> Option<&str> {
        self.from_address
            .as_deref()
            .or(self.username.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/duenotify/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("duenotify").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("duenotify")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/duenotify-config/config.toml")
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognised keys: `PORT`, `DUENOTIFY_DB`, `JWT_SECRET`, `EMAIL_USER`,
    /// `EMAIL_PASS`, `SMTP_HOST`, `REMINDER_TZ`. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("ignoring invalid PORT value: {port}"),
            }
        }
        if let Some(db) = get("DUENOTIFY_DB") {
            self.store.db_path = PathBuf::from(db);
        }
        if let Some(secret) = get("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(user) = get("EMAIL_USER") {
            self.mail.username = Some(user);
        }
        if let Some(pass) = get("EMAIL_PASS") {
            self.mail.password = Some(pass);
        }
        if let Some(host) = get("SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Some(tz) = get("REMINDER_TZ") {
            self.reminder.timezone = tz;
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self
            .auth
            .jwt_secret
            .as_deref()
            .is_some_and(|secret| secret.trim().is_empty())
        {
            return Err(ServiceError::Config("auth.jwt_secret must not be blank".into()));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ServiceError::Config("auth.token_ttl_secs must be positive".into()));
        }
        let fraction = self.reminder.lead_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ServiceError::Config(format!(
                "reminder.lead_fraction must be in (0, 1], got {fraction}"
            )));
        }
        self.reminder.parsed_timezone()?;
        if self.mail.smtp_host.is_some() && self.mail.sender().is_none() {
            return Err(ServiceError::Config(
                "mail.from_address or mail.username is required when smtp_host is set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert!((config.reminder.lead_fraction - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.reminder.timezone, "Asia/Almaty");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ServiceConfig::default();
        config.server.port = 8080;
        config.reminder.timezone = "Europe/Berlin".to_owned();
        config.mail.smtp_host = Some("smtp.example.com".to_owned());

        config.save_to_file(&path).expect("save");
        let loaded = ServiceConfig::from_file(&path).expect("load");
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.reminder.timezone, "Europe/Berlin");
        assert_eq!(loaded.mail.smtp_host.as_deref(), Some("smtp.example.com"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ServiceConfig = toml::from_str("[server]\nport = 9000\n").expect("parse");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.mail.smtp_port, 587);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [
            ("PORT", "7000"),
            ("JWT_SECRET", "s3cret"),
            ("EMAIL_USER", "bot@example.com"),
            ("REMINDER_TZ", "UTC"),
            ("SMTP_HOST", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| (*v).to_owned()));

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.mail.sender(), Some("bot@example.com"));
        assert_eq!(config.reminder.timezone, "UTC");
        assert!(config.mail.smtp_host.is_none(), "blank values are ignored");
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(|k| (k == "PORT").then(|| "not-a-port".to_owned()));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ServiceConfig::default();
        config.reminder.lead_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.reminder.timezone = "Mars/Olympus".to_owned();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.auth.jwt_secret = Some("   ".to_owned());
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.mail.smtp_host = Some("smtp.example.com".to_owned());
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = ServiceConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("duenotify"));
    }
}
