use thiserror::Error;

/// Errors that can occur within any notifier.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The recipient or sender address could not be parsed.
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The message could not be assembled (headers, encoding).
    #[error("Message build failed: {0}")]
    Build(String),

    /// The transport accepted the connection but delivery failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The notifier configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
