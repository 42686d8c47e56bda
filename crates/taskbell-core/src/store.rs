//! Read contracts the reminder engine consumes from the entity store.
//!
//! Implementations must be thread-safe: timer firings for different tasks
//! call into the store concurrently.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Task, TaskId, User, UserId};

pub trait TaskStore: Send + Sync {
    fn find_task_by_id(&self, id: TaskId) -> Result<Option<Task>>;

    /// Tasks that are not completed, have a due date, and whose due instant
    /// falls in `(now, now + LEAD_WINDOW_MINUTES]`, earliest first.
    fn find_tasks_due_within_lead_window(&self, now: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Every non-completed task that has a due date, earliest first.
    fn find_pending_with_due_date(&self) -> Result<Vec<Task>>;

    /// Non-completed tasks whose due instant is strictly before `now`.
    fn find_overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>>;
}

pub trait UserStore: Send + Sync {
    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>>;
}
