//! In-memory fakes for scheduler tests.
//!
//! Compiled for this crate's unit tests and, behind the `test-util`
//! feature, for integration tests and downstream crates.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use taskbell_core::{
    config::LEAD_WINDOW_MINUTES,
    reminder::ReminderMessage,
    types::{Task, TaskId, User, UserId},
    Clock, CoreError, TaskStore, UserStore,
};
use taskbell_notify::{error::Result as NotifyResult, Notifier, NotifyError};

/// Wall clock that follows tokio's (possibly paused) timer clock, so
/// `advance` moves rule evaluation and timers together.
pub struct TokioClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + Duration::from_std(self.start.elapsed()).unwrap()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<HashMap<TaskId, Task>>,
    users: Mutex<HashMap<UserId, User>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn add_task(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn add_user(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn fail_reads(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    fn check(&self) -> taskbell_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::Database("store offline".to_string()));
        }
        Ok(())
    }

    fn open_sorted(&self, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| !t.completed && t.due_date.is_some() && keep(t))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.due_date, t.id));
        tasks
    }
}

impl TaskStore for MemoryStore {
    fn find_task_by_id(&self, id: TaskId) -> taskbell_core::Result<Option<Task>> {
        self.check()?;
        Ok(self.tasks.lock().unwrap().get(&id).cloned())
    }

    fn find_tasks_due_within_lead_window(
        &self,
        now: DateTime<Utc>,
    ) -> taskbell_core::Result<Vec<Task>> {
        self.check()?;
        let until = now + Duration::minutes(LEAD_WINDOW_MINUTES);
        Ok(self.open_sorted(|t| t.due_instant().is_some_and(|d| d > now && d <= until)))
    }

    fn find_pending_with_due_date(&self) -> taskbell_core::Result<Vec<Task>> {
        self.check()?;
        Ok(self.open_sorted(|_| true))
    }

    fn find_overdue_tasks(&self, now: DateTime<Utc>) -> taskbell_core::Result<Vec<Task>> {
        self.check()?;
        Ok(self.open_sorted(|t| t.due_instant().is_some_and(|d| d < now)))
    }
}

impl UserStore for MemoryStore {
    fn find_user_by_id(&self, id: UserId) -> taskbell_core::Result<Option<User>> {
        self.check()?;
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }
}

/// Captures every message instead of delivering it. Recipients listed in
/// `refuse` get a send error.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<ReminderMessage>>,
    refuse: Vec<String>,
}

impl RecordingNotifier {
    pub fn refusing(addresses: &[&str]) -> Self {
        Self {
            sent: Mutex::default(),
            refuse: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<ReminderMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel_name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &ReminderMessage) -> NotifyResult<()> {
        if self.refuse.contains(&message.to) {
            return Err(NotifyError::SendFailed(format!("mailbox {} full", message.to)));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    fn channel_name(&self) -> &str {
        "failing"
    }

    async fn send(&self, _message: &ReminderMessage) -> NotifyResult<()> {
        Err(NotifyError::SendFailed("relay refused connection".to_string()))
    }
}
