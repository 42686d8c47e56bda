//! `taskbell-store` — SQLite implementation of the task and user stores.

pub mod db;
pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::SqliteStore;
