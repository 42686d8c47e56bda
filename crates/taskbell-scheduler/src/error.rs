use taskbell_core::CoreError;
use taskbell_notify::NotifyError;
use thiserror::Error;

/// Errors raised by [`SchedulerService`](crate::SchedulerService). They are
/// logged where they occur; the lifecycle layer never has to handle them.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The timer backend could not accept the registration (no runtime).
    #[error("Scheduling backend unavailable: {0}")]
    Backend(String),

    /// Reading tasks from the store failed.
    #[error("Store error: {0}")]
    Store(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Failure to carry out a reminder. Anomalies such as a missing owner are
/// not errors; see [`Anomaly`](crate::executor::Anomaly).
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The notifier rejected or failed to deliver the reminder.
    #[error("Dispatch failed for task {task_id}: {source}")]
    Dispatch {
        task_id: i64,
        #[source]
        source: NotifyError,
    },

    /// The owner lookup failed at the store level.
    #[error("Store error: {0}")]
    Store(#[from] CoreError),
}
