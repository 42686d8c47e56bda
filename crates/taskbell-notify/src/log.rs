use async_trait::async_trait;
use taskbell_core::reminder::ReminderMessage;
use tracing::info;

use crate::{error::Result, notifier::Notifier};

/// Writes reminders to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn channel_name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &ReminderMessage) -> Result<()> {
        info!(
            channel = "log",
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "reminder (no SMTP relay configured)"
        );
        Ok(())
    }
}
