//! `taskbell-scheduler` — one-shot reminder timers for tasks.
//!
//! # Overview
//!
//! [`SchedulerService`] keeps a registry of task id → tokio timer. When a
//! timer fires, [`TaskExecutionJob`] re-reads the task, gates it on the
//! [`RuleEngine`](taskbell_rules::RuleEngine) and hands it to the
//! [`ActionExecutor`], which resolves the owner and sends the reminder.
//! A periodic sweep runs the same job over every task due within the lead
//! window, catching anything a timer missed. Timer and sweep share the job's
//! record of reminded due dates, so each due date is reminded once.
//!
//! # Firing path
//!
//! | Step               | Component            | Failure handling                  |
//! |--------------------|----------------------|-----------------------------------|
//! | timer wakes        | `SchedulerService`   | stale registration → no-op        |
//! | task re-read       | `TaskExecutionJob`   | missing / store error → logged    |
//! | rule gate          | `RuleEngine`         | not due soon → silent skip        |
//! | dedupe             | `TaskExecutionJob`   | already reminded → skip           |
//! | owner + dispatch   | `ActionExecutor`     | anomaly → skip, send error → Err  |

pub mod error;
pub mod executor;
pub mod job;
pub mod lifecycle;
pub mod service;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{ExecutionError, Result, SchedulerError};
pub use executor::{ActionExecutor, ActionKind, Anomaly, ExecutionOutcome};
pub use job::{JobContext, JobMode, JobReport, TaskExecutionJob};
pub use lifecycle::{LifecycleAction, LifecycleEvent};
pub use service::{OverdueTask, ScheduledJob, SchedulerService};
