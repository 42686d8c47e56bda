use taskbell_core::CoreError;
use thiserror::Error;

/// Errors that can occur inside the SQLite store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection.
    #[error("connection mutex poisoned")]
    Poisoned,

    /// Referenced user row does not exist.
    #[error("user not found: {id}")]
    UserNotFound { id: i64 },
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
