use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration as StdDuration,
};

use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use taskbell_core::{
    config::{MIN_REMINDER_DELAY_SECS, REMINDER_LEAD_MINUTES},
    types::{Task, TaskId},
    TaskStore,
};
use taskbell_rules::{RuleEngine, TaskAssessment};
use tokio::{runtime::Handle, sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{Result, SchedulerError},
    job::{JobContext, JobReport, TaskExecutionJob},
};

/// One live timer. `registration` is unique per schedule call so a timer
/// that lost a race with cancel or replace can tell it is stale.
struct ScheduledReminder {
    job_key: String,
    trigger_at: DateTime<Utc>,
    registration: Uuid,
    handle: JoinHandle<()>,
}

/// Diagnostic view of a registered reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledJob {
    pub task_id: i64,
    pub job_key: String,
    pub trigger_at: DateTime<Utc>,
}

/// An open task past its due instant, with its rule assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueTask {
    pub task: Task,
    pub assessment: TaskAssessment,
}

struct Inner {
    jobs: DashMap<TaskId, ScheduledReminder>,
    tasks: Arc<dyn TaskStore>,
    job: TaskExecutionJob,
}

impl Inner {
    /// Consume the record for `id` if it still belongs to `registration`.
    /// A cancel or replace that got there first leaves nothing matching.
    fn take_if_current(&self, id: TaskId, registration: Uuid) -> bool {
        self.jobs
            .remove_if(&id, |_, r| r.registration == registration)
            .is_some()
    }
}

/// Maps task ids to one-shot reminder timers.
///
/// Cloning is cheap and every clone shares the same registry. At most one
/// timer is live per task id; scheduling again replaces the old timer under
/// the map's entry lock.
#[derive(Clone)]
pub struct SchedulerService {
    inner: Arc<Inner>,
}

impl SchedulerService {
    pub fn new(tasks: Arc<dyn TaskStore>, job: TaskExecutionJob) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: DashMap::new(),
                tasks,
                job,
            }),
        }
    }

    pub fn rules(&self) -> &RuleEngine {
        self.inner.job.rules()
    }

    pub fn job(&self) -> &TaskExecutionJob {
        &self.inner.job
    }

    /// Register a reminder one hour before the task's due instant.
    ///
    /// Returns the trigger instant, or `None` when the task has no due date
    /// or is already past due. A reminder that would land in the past fires
    /// [`MIN_REMINDER_DELAY_SECS`] from now instead.
    pub fn schedule_task(&self, task: &Task) -> Result<Option<DateTime<Utc>>> {
        let Some(trigger_at) = self.plan(task) else {
            return Ok(None);
        };
        self.register(task.id, trigger_at).map(Some)
    }

    /// Remove and abort the task's timer. Returns whether one existed.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        match self.inner.jobs.remove(&id) {
            Some((_, reminder)) => {
                reminder.handle.abort();
                info!(task_id = %id, job_key = %reminder.job_key, "cancelled scheduled task");
                true
            }
            None => {
                debug!(task_id = %id, "task was not scheduled, nothing to cancel");
                false
            }
        }
    }

    /// Recompute the trigger from scratch. When the task no longer qualifies
    /// the existing timer is cancelled; otherwise it is replaced in place.
    pub fn reschedule_task(&self, task: &Task) -> Result<Option<DateTime<Utc>>> {
        info!(task_id = %task.id, "rescheduling task");
        let Some(trigger_at) = self.plan(task) else {
            self.cancel_task(task.id);
            return Ok(None);
        };
        match self.register(task.id, trigger_at) {
            Ok(at) => Ok(Some(at)),
            Err(e) => {
                self.cancel_task(task.id);
                Err(e)
            }
        }
    }

    pub fn is_task_scheduled(&self, id: TaskId) -> bool {
        self.inner.jobs.contains_key(&id)
    }

    pub fn next_execution_time(&self, id: TaskId) -> Option<DateTime<Utc>> {
        self.inner.jobs.get(&id).map(|r| r.trigger_at)
    }

    pub fn scheduled_count(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Registered reminders, soonest first.
    pub fn scheduled_snapshot(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self
            .inner
            .jobs
            .iter()
            .map(|entry| ScheduledJob {
                task_id: entry.key().get(),
                job_key: entry.job_key.clone(),
                trigger_at: entry.trigger_at,
            })
            .collect();
        jobs.sort_by_key(|j| (j.trigger_at, j.task_id));
        jobs
    }

    /// Re-register timers for every pending task that is not yet due.
    /// Returns the number of tasks scheduled.
    pub fn restore_from_store(&self) -> Result<usize> {
        let now = self.rules().now();
        let pending = self.inner.tasks.find_pending_with_due_date()?;

        let mut restored = 0;
        for task in pending
            .iter()
            .filter(|t| t.due_instant().is_some_and(|due| due > now))
        {
            match self.schedule_task(task) {
                Ok(Some(_)) => restored += 1,
                Ok(None) => {}
                Err(e) => warn!(task_id = %task.id, error = %e, "could not restore reminder"),
            }
        }
        info!(restored, candidates = pending.len(), "reminder schedule restored");
        Ok(restored)
    }

    /// Open tasks past their due instant, most urgent first. Read-only:
    /// overdue tasks are never reminded.
    pub fn overdue_tasks(&self) -> Result<Vec<OverdueTask>> {
        let overdue = self.inner.tasks.find_overdue_tasks(self.rules().now())?;
        let ranked = self.rules().rank_by_urgency(&overdue);

        let mut by_id: HashMap<i64, Task> =
            overdue.into_iter().map(|t| (t.id.get(), t)).collect();
        let report: Vec<OverdueTask> = ranked
            .into_iter()
            .filter_map(|assessment| {
                by_id
                    .remove(&assessment.task_id)
                    .map(|task| OverdueTask { task, assessment })
            })
            .collect();
        info!(count = report.len(), "overdue tasks ranked");
        Ok(report)
    }

    /// Run the job once in sweep mode.
    pub async fn run_sweep(&self) -> JobReport {
        self.inner.job.run(JobContext::sweep()).await
    }

    /// Sweep every `period` until `shutdown` broadcasts `true`. The first
    /// sweep runs immediately.
    pub async fn run_sweep_loop(&self, period: StdDuration, mut shutdown: watch::Receiver<bool>) {
        info!(period_secs = period.as_secs(), "sweep loop started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.run_sweep().await;
                    info!(
                        dispatched = report.dispatched,
                        skipped = report.skipped,
                        failed = report.failed,
                        "sweep finished"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("sweep loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    // --- private helpers ---------------------------------------------------

    /// Trigger instant for `task`, or `None` if it should not be scheduled.
    fn plan(&self, task: &Task) -> Option<DateTime<Utc>> {
        let Some(due) = task.due_instant() else {
            warn!(task_id = %task.id, "task has no due date, not scheduling");
            return None;
        };

        let now = self.rules().now();
        if due < now {
            warn!(task_id = %task.id, %due, "task due date is in the past, skipping scheduling");
            return None;
        }

        let reminder = due - Duration::minutes(REMINDER_LEAD_MINUTES);
        if reminder < now {
            Some(now + Duration::seconds(MIN_REMINDER_DELAY_SECS))
        } else {
            Some(reminder)
        }
    }

    /// Spawn the timer and swap it into the registry, aborting any previous
    /// timer for the same id inside the entry lock.
    fn register(&self, id: TaskId, trigger_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let runtime = Handle::try_current().map_err(|e| {
            error!(task_id = %id, error = %e, "failed to schedule task");
            SchedulerError::Backend(e.to_string())
        })?;

        let delay = (trigger_at - self.rules().now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        let registration = Uuid::new_v4();
        let job_key = id.job_key();

        match self.inner.jobs.entry(id) {
            Entry::Occupied(mut slot) => {
                let handle = spawn_timer(&runtime, Arc::downgrade(&self.inner), id, registration, delay);
                let old = slot.insert(ScheduledReminder {
                    job_key: job_key.clone(),
                    trigger_at,
                    registration,
                    handle,
                });
                old.handle.abort();
                info!(task_id = %id, "replaced existing reminder");
            }
            Entry::Vacant(slot) => {
                let handle = spawn_timer(&runtime, Arc::downgrade(&self.inner), id, registration, delay);
                slot.insert(ScheduledReminder {
                    job_key: job_key.clone(),
                    trigger_at,
                    registration,
                    handle,
                });
            }
        }

        info!(task_id = %id, %job_key, %trigger_at, "scheduled task reminder");
        Ok(trigger_at)
    }
}

fn spawn_timer(
    runtime: &Handle,
    inner: Weak<Inner>,
    id: TaskId,
    registration: Uuid,
    delay: StdDuration,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        tokio::time::sleep(delay).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.take_if_current(id, registration) {
            debug!(task_id = %id, "stale reminder timer, not firing");
            return;
        }

        info!(task_id = %id, "reminder timer fired");
        inner.job.run(JobContext::for_task(id)).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        executor::ActionExecutor,
        testing::{MemoryStore, RecordingNotifier, TokioClock},
    };
    use chrono::{NaiveDate, TimeZone};
    use taskbell_core::types::{Priority, User, UserId};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
    }

    fn service() -> (SchedulerService, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::default());
        store.add_user(User {
            id: UserId(1),
            username: "omar".to_string(),
            email: Some("omar@example.com".to_string()),
            enabled: true,
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let rules = RuleEngine::new(Arc::new(TokioClock::starting_at(base())));
        let job = TaskExecutionJob::new(
            store.clone(),
            rules,
            ActionExecutor::new(store.clone(), notifier.clone()),
        );
        (SchedulerService::new(store.clone(), job), store, notifier)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn undated_and_past_tasks_are_not_scheduled() {
        let (svc, _, _) = service();
        assert_eq!(svc.schedule_task(&Task::new(1, 1, "someday")).unwrap(), None);

        let past = Task::new(2, 1, "late").with_due_date(date(2026, 8, 1));
        assert_eq!(svc.schedule_task(&past).unwrap(), None);
        assert_eq!(svc.scheduled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_is_one_hour_before_due() {
        let (svc, _, _) = service();
        let task = Task::new(3, 1, "Dentist").with_due_date(date(2026, 9, 5));
        let at = svc.schedule_task(&task).unwrap().unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 9, 4, 23, 0, 0).unwrap());
        assert_eq!(svc.next_execution_time(task.id), Some(at));

        let snapshot = svc.scheduled_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].job_key, "task-3");
    }

    #[tokio::test(start_paused = true)]
    async fn double_schedule_keeps_one_timer() {
        let (svc, _, _) = service();
        let task = Task::new(4, 1, "x").with_due_date(date(2026, 9, 10));
        svc.schedule_task(&task).unwrap();
        svc.schedule_task(&task).unwrap();
        assert_eq!(svc.scheduled_count(), 1);
        assert!(svc.is_task_scheduled(task.id));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (svc, _, _) = service();
        assert!(!svc.cancel_task(TaskId(999)));

        let task = Task::new(5, 1, "x").with_due_date(date(2026, 9, 10));
        svc.schedule_task(&task).unwrap();
        assert!(svc.cancel_task(task.id));
        assert!(!svc.cancel_task(task.id));
        assert!(!svc.is_task_scheduled(task.id));
        assert_eq!(svc.next_execution_time(task.id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_to_undated_cancels() {
        let (svc, _, _) = service();
        let mut task = Task::new(6, 1, "x").with_due_date(date(2026, 9, 10));
        svc.schedule_task(&task).unwrap();

        task.due_date = None;
        assert_eq!(svc.reschedule_task(&task).unwrap(), None);
        assert!(!svc.is_task_scheduled(task.id));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_schedules_only_future_tasks() {
        let (svc, store, _) = service();
        store.add_task(Task::new(7, 1, "future").with_due_date(date(2026, 9, 3)));
        store.add_task(Task::new(8, 1, "past").with_due_date(date(2026, 8, 30)));
        store.add_task(
            Task::new(9, 1, "done")
                .with_due_date(date(2026, 9, 3))
                .mark_completed(base()),
        );

        assert_eq!(svc.restore_from_store().unwrap(), 1);
        assert!(svc.is_task_scheduled(TaskId(7)));
        assert!(!svc.is_task_scheduled(TaskId(8)));
        assert!(!svc.is_task_scheduled(TaskId(9)));
    }

    #[test]
    fn scheduling_outside_a_runtime_is_a_backend_error() {
        let (svc, _, _) = {
            let store = Arc::new(MemoryStore::default());
            let notifier = Arc::new(RecordingNotifier::default());
            let rules = RuleEngine::new(Arc::new(taskbell_core::ManualClock::new(base())));
            let job = TaskExecutionJob::new(
                store.clone(),
                rules,
                ActionExecutor::new(store.clone(), notifier.clone()),
            );
            (SchedulerService::new(store.clone(), job), store, notifier)
        };
        let task = Task::new(10, 1, "x").with_due_date(date(2026, 9, 10));
        let err = svc.schedule_task(&task).unwrap_err();
        assert!(matches!(err, SchedulerError::Backend(_)));
        assert!(!svc.is_task_scheduled(task.id));
    }

    fn registration_of(svc: &SchedulerService, id: TaskId) -> Uuid {
        svc.inner.jobs.get(&id).map(|r| r.registration).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn woken_timer_loses_to_a_later_replace() {
        let (svc, store, notifier) = service();
        let task = Task::new(11, 1, "x").with_due_date(date(2026, 9, 10));
        store.add_task(task.clone());

        svc.schedule_task(&task).unwrap();
        let first = registration_of(&svc, task.id);
        svc.schedule_task(&task).unwrap();
        let second = registration_of(&svc, task.id);
        assert_ne!(first, second);

        // The first timer wakes after being replaced: it must not consume
        // the new record.
        assert!(!svc.inner.take_if_current(task.id, first));
        assert!(svc.is_task_scheduled(task.id));

        assert!(svc.inner.take_if_current(task.id, second));
        assert!(!svc.is_task_scheduled(task.id));
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn reschedule_without_a_runtime_drops_the_old_timer() {
        let store = Arc::new(MemoryStore::default());
        let rules = RuleEngine::new(Arc::new(taskbell_core::ManualClock::new(base())));
        let job = TaskExecutionJob::new(
            store.clone(),
            rules,
            ActionExecutor::new(store.clone(), Arc::new(RecordingNotifier::default())),
        );
        let svc = SchedulerService::new(store, job);
        let mut task = Task::new(12, 1, "x").with_due_date(date(2026, 9, 10));

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async { svc.schedule_task(&task).unwrap() });
        assert!(svc.is_task_scheduled(task.id));

        task.due_date = Some(date(2026, 9, 12));
        let err = svc.reschedule_task(&task).unwrap_err();
        assert!(matches!(err, SchedulerError::Backend(_)));
        assert!(!svc.is_task_scheduled(task.id));
        assert_eq!(svc.next_execution_time(task.id), None);
        drop(rt);
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_tasks_are_ranked_by_urgency() {
        let (svc, store, notifier) = service();
        store.add_task(
            Task::new(20, 1, "low")
                .with_due_date(date(2026, 8, 28))
                .with_priority(Some(Priority::Low)),
        );
        store.add_task(
            Task::new(21, 1, "high")
                .with_due_date(date(2026, 8, 30))
                .with_priority(Some(Priority::High)),
        );
        store.add_task(Task::new(22, 1, "future").with_due_date(date(2026, 9, 4)));
        store.add_task(
            Task::new(23, 1, "done")
                .with_due_date(date(2026, 8, 20))
                .mark_completed(base()),
        );

        let overdue = svc.overdue_tasks().unwrap();
        let ids: Vec<i64> = overdue.iter().map(|o| o.task.id.get()).collect();
        assert_eq!(ids, vec![21, 20]);
        assert!(overdue.iter().all(|o| o.assessment.overdue));
        assert_eq!(overdue[0].assessment.urgency_score, 150);
        assert_eq!(svc.scheduled_count(), 0);
        assert!(notifier.sent().is_empty());

        store.fail_reads(true);
        assert!(matches!(svc.overdue_tasks(), Err(SchedulerError::Store(_))));
    }
}
