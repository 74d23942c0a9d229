//! SMTP sender using the `lettre` async transport.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Notifier, NotifyError, ReminderMessage};
use crate::config::MailConfig;
use crate::error::{Result, ServiceError};

/// STARTTLS SMTP sender. The transport pools connections and is built once.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ServiceError::Config("mail.smtp_host is required".into()))?;
        let sender = config.sender().ok_or_else(|| {
            ServiceError::Config("mail.from_address or mail.username is required".into())
        })?;
        let from: Mailbox = sender
            .parse()
            .map_err(|e| ServiceError::Config(format!("invalid sender address '{sender}': {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| ServiceError::Config(format!("SMTP transport error: {e}")))?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (config.username.as_deref(), config.password.as_deref()) {
            builder = builder.credentials(Credentials::new(user.to_owned(), pass.to_owned()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, message: &ReminderMessage) -> std::result::Result<Message, NotifyError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
                address: message.to.clone(),
                reason: e.to_string(),
            })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .body(message.body.clone())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn id(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &ReminderMessage) -> std::result::Result<(), NotifyError> {
        let email = self.build_message(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        tracing::debug!(to = %message.to, "reminder handed to SMTP relay");
        Ok(())
    }
}
