use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a task row. Persisted ids are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    pub fn get(self) -> i64 {
        self.0
    }

    /// Key under which the scheduler registers this task's reminder.
    pub fn job_key(self) -> String {
        format!("task-{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Primary key of a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Task priority. Parsing is case-insensitive; anything else is "unspecified".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Workflow status. `completed` on [`Task`] is authoritative for reminder
/// gating; this field is informational for the reminder body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TaskStatus::Pending),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "CANCELLED" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Read-only snapshot of a task as returned by the task store.
///
/// The reminder engine never mutates tasks; every firing re-reads a fresh
/// snapshot because due date, priority and completion may change at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    /// Calendar deadline without a time of day.
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub status: TaskStatus,
    /// `None` when the stored value is missing or not a known priority.
    pub priority: Option<Priority>,
    pub owner_id: UserId,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// New pending task with `MEDIUM` priority and no due date.
    pub fn new(id: impl Into<TaskId>, owner_id: impl Into<UserId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            due_date: None,
            completed: false,
            status: TaskStatus::Pending,
            priority: Some(Priority::Medium),
            owner_id: owner_id.into(),
            completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    /// Mark completed, keeping `status` in line with the flag.
    pub fn mark_completed(mut self, at: DateTime<Utc>) -> Self {
        self.completed = true;
        self.status = TaskStatus::Completed;
        self.completed_at = Some(at);
        self
    }

    /// Start of the due day in UTC. `None` when the task has no due date.
    pub fn due_instant(&self) -> Option<DateTime<Utc>> {
        self.due_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

/// Owner of tasks; the recipient of reminders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Display name used in the reminder greeting.
    pub username: String,
    /// Contact address. Blank values are treated as missing.
    pub email: Option<String>,
    pub enabled: bool,
}

impl User {
    /// Trimmed, non-empty contact address if the user has one.
    pub fn contact_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!(Priority::from_str("high").unwrap(), Priority::High);
        assert_eq!(Priority::from_str(" Medium ").unwrap(), Priority::Medium);
        assert!(Priority::from_str("urgent").is_err());
    }

    #[test]
    fn status_roundtrips_through_wire_names() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()).unwrap(), status);
        }
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, r#""IN_PROGRESS""#);
    }

    #[test]
    fn due_instant_is_start_of_day_utc() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let task = Task::new(1, 1, "file taxes").with_due_date(date);
        assert_eq!(
            task.due_instant().unwrap().to_rfc3339(),
            "2026-03-14T00:00:00+00:00"
        );
        assert!(Task::new(2, 1, "someday").due_instant().is_none());
    }

    #[test]
    fn blank_email_is_not_a_contact_address() {
        let mut user = User {
            id: UserId(7),
            username: "ana".to_string(),
            email: Some("   ".to_string()),
            enabled: true,
        };
        assert!(user.contact_address().is_none());
        user.email = Some(" ana@example.com ".to_string());
        assert_eq!(user.contact_address(), Some("ana@example.com"));
    }

    #[test]
    fn job_key_uses_task_prefix() {
        assert_eq!(TaskId(42).job_key(), "task-42");
    }
}
