//! Outbound notification senders.
//!
//! The reminder scheduler hands a rendered [`ReminderMessage`] to a
//! [`Notifier`] and does not care how delivery happens. Senders are built
//! once at startup and shared behind an `Arc`.

pub mod log;
pub mod smtp;

pub use log::LogNotifier;
pub use smtp::SmtpNotifier;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MailConfig;
use crate::error::Result;

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    /// Destination address.
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Notification sender contract.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Stable sender identifier (e.g. `smtp`, `log`).
    fn id(&self) -> &'static str;

    /// Deliver one message. Called at most once per reminder.
    async fn send(&self, message: &ReminderMessage) -> std::result::Result<(), NotifyError>;
}

/// Pick the sender for this configuration: SMTP when a relay host is set,
/// otherwise log-only.
pub fn build_notifier(config: &MailConfig) -> Result<Arc<dyn Notifier>> {
    match config.smtp_host.as_deref().map(str::trim) {
        Some(host) if !host.is_empty() => {
            let notifier = SmtpNotifier::from_config(config)?;
            tracing::info!(host, port = config.smtp_port, "reminders will be sent over SMTP");
            Ok(Arc::new(notifier))
        }
        _ => {
            tracing::warn!("no SMTP host configured, reminders will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn log_notifier_is_used_without_smtp_host() {
        let notifier = build_notifier(&MailConfig::default()).expect("build");
        assert_eq!(notifier.id(), "log");
    }

    #[tokio::test]
    async fn smtp_notifier_is_used_with_smtp_host() {
        let config = MailConfig {
            smtp_host: Some("smtp.example.com".to_owned()),
            username: Some("bot@example.com".to_owned()),
            password: Some("app-password".to_owned()),
            ..MailConfig::default()
        };
        let notifier = build_notifier(&config).expect("build");
        assert_eq!(notifier.id(), "smtp");
    }
}
