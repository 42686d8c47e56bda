//! `taskbell-notify` — delivery channels for rendered reminders.
//!
//! The scheduler only sees the [`Notifier`] trait. [`SmtpNotifier`] sends
//! mail through an SMTP relay; [`LogNotifier`] writes the reminder to the
//! log and is the fallback when no relay is configured.

pub mod error;
pub mod log;
pub mod notifier;
pub mod smtp;

pub use error::NotifyError;
pub use log::LogNotifier;
pub use notifier::Notifier;
pub use smtp::SmtpNotifier;
