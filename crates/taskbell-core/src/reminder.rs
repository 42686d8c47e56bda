//! Reminder message rendering, shared by the executor and the notifiers.

use serde::{Deserialize, Serialize};

use crate::types::{Task, User};

pub const SUBJECT_PREFIX: &str = "Task Reminder: ";
/// Format used for the due date line of the body.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A rendered reminder, ready for a notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderMessage {
    /// Recipient contact address.
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ReminderMessage {
    /// Render the reminder for `task` addressed to `to`.
    ///
    /// Description is omitted when empty; the due date line is omitted when
    /// the task has none.
    pub fn render(task: &Task, user: &User, to: &str) -> Self {
        let mut body = String::new();
        body.push_str(&format!("Hello {},\n\n", user.username));
        body.push_str("This is a reminder for your upcoming task:\n\n");
        body.push_str(&format!("Title: {}\n", task.title));

        if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
            body.push_str(&format!("Description: {description}\n"));
        }

        if let Some(due) = task.due_instant() {
            body.push_str(&format!("Due Date: {}\n", due.format(DUE_DATE_FORMAT)));
        }

        let priority = task.priority.map(|p| p.as_str()).unwrap_or("UNSPECIFIED");
        body.push_str(&format!("Priority: {priority}\n"));
        body.push_str(&format!("Status: {}\n\n", task.status));
        body.push_str("Don't forget to complete this task!\n\n");
        body.push_str("Best regards,\n");
        body.push_str("Taskbell");

        Self {
            to: to.to_string(),
            subject: format!("{SUBJECT_PREFIX}{}", task.title),
            body,
        }
    }
}
