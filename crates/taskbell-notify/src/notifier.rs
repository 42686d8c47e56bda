use async_trait::async_trait;
use taskbell_core::reminder::ReminderMessage;

use crate::error::Result;

/// Common interface implemented by every reminder delivery channel.
///
/// Implementations must be `Send + Sync`: timers for different tasks fire on
/// separate Tokio tasks and share one notifier behind an `Arc`.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"smtp"`).
    fn channel_name(&self) -> &str;

    /// Deliver one reminder to `message.to`.
    ///
    /// An `Err` means delivery was attempted and failed; the caller decides
    /// whether that is worth retrying.
    async fn send(&self, message: &ReminderMessage) -> Result<()>;
}
