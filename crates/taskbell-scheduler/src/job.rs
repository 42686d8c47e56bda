use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use serde_json::Value;
use taskbell_core::{types::Task, TaskId, TaskStore};
use taskbell_rules::RuleEngine;
use tracing::{debug, error, info, warn};

use crate::executor::{ActionExecutor, ExecutionOutcome};

/// Job data handed to a firing. A positive `task_id` selects specific-task
/// mode; anything else runs a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobContext {
    pub task_id: Option<i64>,
}

impl JobContext {
    pub fn for_task(id: TaskId) -> Self {
        Self {
            task_id: Some(id.get()),
        }
    }

    pub fn sweep() -> Self {
        Self { task_id: None }
    }

    /// Read `taskId` from a JSON job-data map. Numbers and numeric strings
    /// are accepted; anything else means sweep mode.
    pub fn from_job_data(data: &Value) -> Self {
        let task_id = match data.get("taskId") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        Self { task_id }
    }

    fn target(&self) -> Option<TaskId> {
        self.task_id.filter(|id| *id > 0).map(TaskId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    SpecificTask(i64),
    Sweep,
}

/// Tally of one job run, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub mode: JobMode,
    pub dispatched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl JobReport {
    fn new(mode: JobMode) -> Self {
        Self {
            mode,
            dispatched: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// The unit of work a timer or the sweep loop runs. Failures are logged and
/// counted; nothing escapes [`run`](Self::run).
///
/// Clones share one record of the due date each task was last reminded
/// for, so a timer firing and a sweep covering the same task send a single
/// reminder between them. Records are dropped once the due instant passes.
#[derive(Clone)]
pub struct TaskExecutionJob {
    tasks: Arc<dyn TaskStore>,
    rules: RuleEngine,
    executor: ActionExecutor,
    reminded: Arc<DashMap<TaskId, NaiveDate>>,
}

impl TaskExecutionJob {
    pub fn new(tasks: Arc<dyn TaskStore>, rules: RuleEngine, executor: ActionExecutor) -> Self {
        Self {
            tasks,
            rules,
            executor,
            reminded: Arc::new(DashMap::new()),
        }
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Due date the task was last reminded for, if that is still ahead.
    pub fn reminded_for(&self, id: TaskId) -> Option<NaiveDate> {
        self.reminded.get(&id).map(|d| *d)
    }

    /// Drop the reminder record for a task, e.g. once it is deleted.
    pub fn forget(&self, id: TaskId) {
        self.reminded.remove(&id);
    }

    pub async fn run(&self, ctx: JobContext) -> JobReport {
        self.prune_reminded(self.rules.now());

        let report = match ctx.target() {
            Some(id) => {
                info!(task_id = %id, "executing job for specific task");
                self.run_for_task(id).await
            }
            None => {
                info!("executing job for all due tasks");
                self.run_sweep().await
            }
        };
        debug!(
            dispatched = report.dispatched,
            skipped = report.skipped,
            failed = report.failed,
            "job finished"
        );
        report
    }

    async fn run_for_task(&self, id: TaskId) -> JobReport {
        let mut report = JobReport::new(JobMode::SpecificTask(id.get()));

        let task = match self.tasks.find_task_by_id(id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(task_id = %id, "task not found");
                report.skipped += 1;
                return report;
            }
            Err(e) => {
                error!(task_id = %id, code = e.code(), error = %e, "error loading task");
                report.failed += 1;
                return report;
            }
        };

        if task.completed {
            info!(task_id = %id, "task already completed, skipping");
            report.skipped += 1;
            return report;
        }

        self.process(&task, &mut report).await;
        report
    }

    async fn run_sweep(&self) -> JobReport {
        let mut report = JobReport::new(JobMode::Sweep);

        let now = self.rules.now();
        let due = match self.tasks.find_tasks_due_within_lead_window(now) {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(code = e.code(), error = %e, "error loading due tasks");
                return report;
            }
        };
        info!(count = due.len(), "tasks due within the lead window");

        for task in &due {
            self.process(task, &mut report).await;
        }
        report
    }

    /// Gate one task on the rules and dispatch it.
    async fn process(&self, task: &Task, report: &mut JobReport) {
        if !self.rules.should_execute(task) {
            debug!(task_id = %task.id, "task does not meet execution criteria");
            report.skipped += 1;
            return;
        }

        let Some(due) = task.due_date else {
            report.skipped += 1;
            return;
        };
        if !self.claim(task.id, due) {
            debug!(task_id = %task.id, %due, "reminder already sent for this due date");
            report.skipped += 1;
            return;
        }

        match self.executor.execute(Some(task)).await {
            Ok(ExecutionOutcome::Dispatched) => report.dispatched += 1,
            Ok(ExecutionOutcome::Skipped(anomaly)) => {
                debug!(task_id = %task.id, ?anomaly, "reminder skipped");
                self.release(task.id, due);
                report.skipped += 1;
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "failed to process task");
                self.release(task.id, due);
                report.failed += 1;
            }
        }
    }

    /// Record `due` as reminded for `id` unless it already is. The entry
    /// lock is released before dispatch.
    fn claim(&self, id: TaskId, due: NaiveDate) -> bool {
        match self.reminded.entry(id) {
            Entry::Occupied(slot) if *slot.get() == due => false,
            Entry::Occupied(mut slot) => {
                slot.insert(due);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(due);
                true
            }
        }
    }

    /// Undo a claim whose dispatch did not go out.
    fn release(&self, id: TaskId, due: NaiveDate) {
        self.reminded.remove_if(&id, |_, d| *d == due);
    }

    fn prune_reminded(&self, now: DateTime<Utc>) {
        self.reminded
            .retain(|_, due| due_instant(*due).is_some_and(|at| at > now));
    }
}

fn due_instant(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}
