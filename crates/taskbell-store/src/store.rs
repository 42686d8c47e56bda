use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension};
use taskbell_core::{
    config::LEAD_WINDOW_MINUTES,
    types::{Priority, Task, TaskId, TaskStatus, User, UserId},
    TaskStore, UserStore,
};
use tracing::{debug, instrument, warn};

use crate::error::{Result, StoreError};

const DATE_FORMAT: &str = "%Y-%m-%d";

const TASK_COLUMNS: &str = "id, title, description, due_date, completed, priority, status,
                            user_id, completed_at";

/// Thread-safe task and user store over one SQLite connection.
///
/// The connection is wrapped in a `Mutex`; the reminder engine issues a
/// handful of short reads per firing so contention stays low.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Open an in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::db::init_db(&conn)?;
        Ok(Self::new(conn))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    #[instrument(skip(self, email))]
    pub fn insert_user(&self, username: &str, email: Option<&str>) -> Result<User> {
        let now = Utc::now().to_rfc3339();
        let db = self.conn()?;
        db.execute(
            "INSERT INTO users (username, email, enabled, created_at) VALUES (?1, ?2, 1, ?3)",
            params![username, email, now],
        )?;
        let id = db.last_insert_rowid();
        debug!(user_id = id, "user inserted");
        Ok(User {
            id: UserId(id),
            username: username.to_string(),
            email: email.map(str::to_string),
            enabled: true,
        })
    }

    /// Enable or disable a user. Disabled users receive no reminders.
    /// Returns `false` if no row has that id.
    #[instrument(skip(self))]
    pub fn set_user_enabled(&self, id: UserId, enabled: bool) -> Result<bool> {
        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE users SET enabled = ?1 WHERE id = ?2",
            params![enabled, id.get()],
        )?;
        Ok(changed > 0)
    }

    /// Insert `task`, ignoring its `id`; returns the stored row with the
    /// assigned id.
    #[instrument(skip(self, task), fields(title = %task.title))]
    pub fn insert_task(&self, task: &Task) -> Result<Task> {
        let now = Utc::now().to_rfc3339();
        let db = self.conn()?;
        let owner_exists: bool = db
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                params![task.owner_id.get()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !owner_exists {
            return Err(StoreError::UserNotFound {
                id: task.owner_id.get(),
            });
        }

        db.execute(
            "INSERT INTO tasks
             (title, description, due_date, completed, priority, status, user_id,
              completed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                task.title,
                task.description,
                task.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
                task.completed,
                task.priority.map(|p| p.as_str()),
                task.status.as_str(),
                task.owner_id.get(),
                task.completed_at.map(|t| t.to_rfc3339()),
                now,
            ],
        )?;
        let id = db.last_insert_rowid();
        debug!(task_id = id, "task inserted");

        let mut stored = task.clone();
        stored.id = TaskId(id);
        Ok(stored)
    }

    /// Overwrite every mutable column of an existing task.
    /// Returns `false` if no row has that id.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub fn update_task(&self, task: &Task) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE tasks
             SET title = ?1, description = ?2, due_date = ?3, completed = ?4,
                 priority = ?5, status = ?6, completed_at = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                task.title,
                task.description,
                task.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
                task.completed,
                task.priority.map(|p| p.as_str()),
                task.status.as_str(),
                task.completed_at.map(|t| t.to_rfc3339()),
                now,
                task.id.get(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Set `completed`, status `COMPLETED` and `completed_at`, returning the
    /// updated task. `None` if the id does not exist.
    #[instrument(skip(self))]
    pub fn mark_completed(&self, id: TaskId, at: DateTime<Utc>) -> Result<Option<Task>> {
        {
            let db = self.conn()?;
            let changed = db.execute(
                "UPDATE tasks
                 SET completed = 1, status = 'COMPLETED', completed_at = ?1, updated_at = ?1
                 WHERE id = ?2",
                params![at.to_rfc3339(), id.get()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_task(id)
    }

    /// Permanently delete a task. Returns `false` if nothing was deleted.
    #[instrument(skip(self))]
    pub fn delete_task(&self, id: TaskId) -> Result<bool> {
        let db = self.conn()?;
        let changed = db.execute("DELETE FROM tasks WHERE id = ?1", params![id.get()])?;
        Ok(changed > 0)
    }

    #[instrument(skip(self))]
    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let db = self.conn()?;
        let task = db
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.get()],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    #[instrument(skip(self))]
    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let db = self.conn()?;
        let user = db
            .query_row(
                "SELECT id, username, email, enabled FROM users WHERE id = ?1",
                params![id.get()],
                |row| {
                    Ok(User {
                        id: UserId(row.get(0)?),
                        username: row.get(1)?,
                        email: row.get(2)?,
                        enabled: row.get::<_, i64>(3)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Open tasks whose due date lies in `[from, to]` (inclusive, by date).
    fn open_tasks_due_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Task>> {
        let db = self.conn()?;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE completed = 0 AND due_date IS NOT NULL
               AND due_date >= ?1 AND due_date <= ?2
             ORDER BY due_date ASC, id ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                from.format(DATE_FORMAT).to_string(),
                to.format(DATE_FORMAT).to_string()
            ],
            row_to_task,
        )?;
        collect_rows(rows)
    }

    fn open_tasks_with_due_date(&self) -> Result<Vec<Task>> {
        let db = self.conn()?;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE completed = 0 AND due_date IS NOT NULL
             ORDER BY due_date ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_task)?;
        collect_rows(rows)
    }
}

/// Keep readable rows; a corrupt row is logged and skipped rather than
/// failing the whole query.
fn collect_rows<I>(rows: I) -> Result<Vec<Task>>
where
    I: Iterator<Item = rusqlite::Result<Task>>,
{
    let mut tasks = Vec::new();
    for row in rows {
        match row {
            Ok(task) => tasks.push(task),
            Err(e) => warn!(error = %e, "skipping unreadable task row"),
        }
    }
    Ok(tasks)
}

/// Map a SELECT row (column order from `TASK_COLUMNS`) to a `Task`.
fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let due_date = row
        .get::<_, Option<String>>(3)?
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
            })
        })
        .transpose()?;

    // Unknown priority text reads as "unspecified" rather than an error.
    let priority = row
        .get::<_, Option<String>>(5)?
        .and_then(|s| s.parse::<Priority>().ok());

    let status = row
        .get::<_, String>(6)?
        .parse::<TaskStatus>()
        .unwrap_or_default();

    let completed_at = row
        .get::<_, Option<String>>(8)?
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(Task {
        id: TaskId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        due_date,
        completed: row.get::<_, i64>(4)? != 0,
        status,
        priority,
        owner_id: UserId(row.get(7)?),
        completed_at,
    })
}

impl TaskStore for SqliteStore {
    fn find_task_by_id(&self, id: TaskId) -> taskbell_core::Result<Option<Task>> {
        Ok(self.get_task(id)?)
    }

    fn find_tasks_due_within_lead_window(
        &self,
        now: DateTime<Utc>,
    ) -> taskbell_core::Result<Vec<Task>> {
        let until = now + Duration::minutes(LEAD_WINDOW_MINUTES);
        let tasks = self
            .open_tasks_due_between(now.date_naive(), until.date_naive())?
            .into_iter()
            .filter(|t| t.due_instant().is_some_and(|due| due > now && due <= until))
            .collect();
        Ok(tasks)
    }

    fn find_pending_with_due_date(&self) -> taskbell_core::Result<Vec<Task>> {
        Ok(self.open_tasks_with_due_date()?)
    }

    fn find_overdue_tasks(&self, now: DateTime<Utc>) -> taskbell_core::Result<Vec<Task>> {
        let tasks = self
            .open_tasks_with_due_date()?
            .into_iter()
            .filter(|t| t.due_instant().is_some_and(|due| due < now))
            .collect();
        Ok(tasks)
    }
}

impl UserStore for SqliteStore {
    fn find_user_by_id(&self, id: UserId) -> taskbell_core::Result<Option<User>> {
        Ok(self.get_user(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn midnight(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded() -> (SqliteStore, User) {
        let store = SqliteStore::open_in_memory().expect("open");
        let user = store.insert_user("iris", Some("iris@example.com")).expect("user");
        (store, user)
    }

    #[test]
    fn insert_and_read_back_task() {
        let (store, user) = seeded();
        let draft = Task::new(0, user.id.get(), "Water plants")
            .with_description("balcony")
            .with_due_date(date(2026, 4, 2))
            .with_priority(Some(Priority::Low));
        let stored = store.insert_task(&draft).unwrap();
        assert!(stored.id.get() > 0);

        let found = store.find_task_by_id(stored.id).unwrap().expect("task exists");
        assert_eq!(found, stored);
        assert!(store.find_task_by_id(TaskId(999)).unwrap().is_none());
    }

    #[test]
    fn insert_task_requires_owner() {
        let (store, _) = seeded();
        let err = store.insert_task(&Task::new(0, 404, "orphan")).unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound { id: 404 }));
    }

    #[test]
    fn lead_window_query_is_exclusive_of_now_and_inclusive_of_hour() {
        let (store, user) = seeded();
        let owner = user.id.get();
        let in_window = store
            .insert_task(&Task::new(0, owner, "tomorrow").with_due_date(date(2026, 4, 3)))
            .unwrap();
        store
            .insert_task(&Task::new(0, owner, "later").with_due_date(date(2026, 4, 4)))
            .unwrap();
        store
            .insert_task(
                &Task::new(0, owner, "done")
                    .with_due_date(date(2026, 4, 3))
                    .mark_completed(midnight(2026, 4, 1)),
            )
            .unwrap();
        store.insert_task(&Task::new(0, owner, "undated")).unwrap();

        // 23:00 the day before: the 04-03 midnight is exactly one hour away.
        let now = midnight(2026, 4, 3) - Duration::hours(1);
        let due = store.find_tasks_due_within_lead_window(now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, in_window.id);

        // One minute earlier the same task is outside the window.
        let due = store
            .find_tasks_due_within_lead_window(now - Duration::minutes(1))
            .unwrap();
        assert!(due.is_empty());

        // Exactly at the due instant the task is no longer "after now".
        let due = store
            .find_tasks_due_within_lead_window(midnight(2026, 4, 3))
            .unwrap();
        assert!(due.is_empty());
    }

    #[test]
    fn overdue_and_pending_queries() {
        let (store, user) = seeded();
        let owner = user.id.get();
        store
            .insert_task(&Task::new(0, owner, "past").with_due_date(date(2026, 1, 1)))
            .unwrap();
        store
            .insert_task(&Task::new(0, owner, "future").with_due_date(date(2026, 12, 1)))
            .unwrap();
        store.insert_task(&Task::new(0, owner, "undated")).unwrap();

        let now = midnight(2026, 6, 1);
        let overdue = store.find_overdue_tasks(now).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].title, "past");

        let pending = store.find_pending_with_due_date().unwrap();
        let titles: Vec<_> = pending.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["past", "future"]);
    }

    #[test]
    fn update_complete_and_delete() {
        let (store, user) = seeded();
        let mut task = store
            .insert_task(&Task::new(0, user.id.get(), "draft").with_due_date(date(2026, 5, 5)))
            .unwrap();

        task.title = "final".to_string();
        task.priority = Some(Priority::High);
        assert!(store.update_task(&task).unwrap());
        assert_eq!(store.get_task(task.id).unwrap().unwrap().title, "final");

        let done = store
            .mark_completed(task.id, midnight(2026, 5, 4))
            .unwrap()
            .expect("exists");
        assert!(done.completed);
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_at, Some(midnight(2026, 5, 4)));

        assert!(store.delete_task(task.id).unwrap());
        assert!(!store.delete_task(task.id).unwrap());
        assert!(store.mark_completed(task.id, midnight(2026, 5, 4)).unwrap().is_none());
    }

    #[test]
    fn unknown_priority_text_reads_as_unspecified() {
        let (store, user) = seeded();
        let task = store.insert_task(&Task::new(0, user.id.get(), "x")).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE tasks SET priority = 'urgent' WHERE id = ?1",
                params![task.id.get()],
            )
            .unwrap();
        assert_eq!(store.get_task(task.id).unwrap().unwrap().priority, None);
    }

    #[test]
    fn finds_users() {
        let (store, user) = seeded();
        let found = store.find_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(found.email.as_deref(), Some("iris@example.com"));
        assert!(store.find_user_by_id(UserId(77)).unwrap().is_none());
    }

    #[test]
    fn disabling_a_user_round_trips() {
        let (store, user) = seeded();
        assert!(store.set_user_enabled(user.id, false).unwrap());
        assert!(!store.find_user_by_id(user.id).unwrap().unwrap().enabled);
        assert!(store.set_user_enabled(user.id, true).unwrap());
        assert!(store.get_user(user.id).unwrap().unwrap().enabled);
        assert!(!store.set_user_enabled(UserId(77), false).unwrap());
    }
}
