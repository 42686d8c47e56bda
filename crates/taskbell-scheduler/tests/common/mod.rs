//! Shared harness: SQLite-backed store wired to the crate's recording
//! notifier and paused-time clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use taskbell_core::{
    types::{Task, User, UserId},
    UserStore,
};
use taskbell_rules::RuleEngine;
pub use taskbell_scheduler::testing::{RecordingNotifier, TokioClock};
use taskbell_scheduler::{ActionExecutor, SchedulerService, TaskExecutionJob};
use taskbell_store::SqliteStore;

/// User lookup that hides some ids, for owner-not-found scenarios.
pub struct FilteredUsers {
    inner: Arc<SqliteStore>,
    hidden: Vec<UserId>,
}

impl UserStore for FilteredUsers {
    fn find_user_by_id(&self, id: UserId) -> taskbell_core::Result<Option<User>> {
        if self.hidden.contains(&id) {
            return Ok(None);
        }
        self.inner.find_user_by_id(id)
    }
}

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: SchedulerService,
}

impl Harness {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self::build(base, RecordingNotifier::default(), Vec::new())
    }

    pub fn build(base: DateTime<Utc>, notifier: RecordingNotifier, hidden: Vec<UserId>) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(notifier);
        let users = Arc::new(FilteredUsers {
            inner: store.clone(),
            hidden,
        });
        let rules = RuleEngine::new(Arc::new(TokioClock::starting_at(base)));
        let job = TaskExecutionJob::new(
            store.clone(),
            rules,
            ActionExecutor::new(users, notifier.clone()),
        );
        let service = SchedulerService::new(store.clone(), job);
        Self {
            store,
            notifier,
            service,
        }
    }

    pub fn user(&self, name: &str) -> User {
        self.store
            .insert_user(name, Some(&format!("{name}@example.com")))
            .unwrap()
    }

    pub fn task(&self, owner: &User, title: &str, due: NaiveDate) -> Task {
        self.store
            .insert_task(&Task::new(0, owner.id, title).with_due_date(due))
            .unwrap()
    }
}
