use async_trait::async_trait;

use super::{Notifier, NotifyError, ReminderMessage};

/// Writes reminders to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn id(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &ReminderMessage) -> Result<(), NotifyError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "reminder (log only)"
        );
        Ok(())
    }
}
