//! Task lifecycle → reminder registry.
//!
//! The CRUD layer reports what happened to a task; [`SchedulerService::apply`]
//! turns that into schedule, reschedule or cancel.

use chrono::{DateTime, Utc};
use taskbell_core::types::{Task, TaskId};
use tracing::debug;

use crate::service::SchedulerService;

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Created(Task),
    Updated { previous: Task, current: Task },
    Deleted(TaskId),
    Completed(TaskId),
}

impl LifecycleEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            LifecycleEvent::Created(task) => task.id,
            LifecycleEvent::Updated { current, .. } => current.id,
            LifecycleEvent::Deleted(id) | LifecycleEvent::Completed(id) => *id,
        }
    }
}

/// What the registry did in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Scheduled(DateTime<Utc>),
    Cancelled { was_scheduled: bool },
    Ignored,
}

impl SchedulerService {
    /// Keep the reminder registry in step with one lifecycle event. Errors
    /// are logged by the service. A failed create is [`LifecycleAction::Ignored`];
    /// a failed update has already dropped the old timer and reports it as
    /// cancelled.
    pub fn apply(&self, event: LifecycleEvent) -> LifecycleAction {
        let id = event.task_id();
        let action = match event {
            LifecycleEvent::Created(task) => {
                if task.completed {
                    LifecycleAction::Ignored
                } else {
                    scheduled(self.schedule_task(&task).ok().flatten())
                }
            }
            LifecycleEvent::Updated { previous, current } => {
                if current.completed {
                    LifecycleAction::Cancelled {
                        was_scheduled: self.cancel_task(current.id),
                    }
                } else {
                    if previous.due_date != current.due_date {
                        debug!(
                            task_id = %current.id,
                            from = ?previous.due_date,
                            to = ?current.due_date,
                            "due date changed"
                        );
                    }
                    let was_scheduled = self.is_task_scheduled(current.id);
                    match self.reschedule_task(&current) {
                        Ok(Some(at)) => LifecycleAction::Scheduled(at),
                        Ok(None) | Err(_) => LifecycleAction::Cancelled { was_scheduled },
                    }
                }
            }
            LifecycleEvent::Deleted(id) => {
                self.job().forget(id);
                LifecycleAction::Cancelled {
                    was_scheduled: self.cancel_task(id),
                }
            }
            LifecycleEvent::Completed(id) => LifecycleAction::Cancelled {
                was_scheduled: self.cancel_task(id),
            },
        };
        debug!(task_id = %id, ?action, "lifecycle event applied");
        action
    }
}

fn scheduled(at: Option<DateTime<Utc>>) -> LifecycleAction {
    at.map_or(LifecycleAction::Ignored, LifecycleAction::Scheduled)
}
