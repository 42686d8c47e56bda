//! `taskbell-core` — shared domain types, store contracts and configuration
//! for the reminder engine.

pub mod clock;
pub mod config;
pub mod error;
pub mod reminder;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use store::{TaskStore, UserStore};
pub use types::{Priority, Task, TaskId, TaskStatus, User, UserId};
