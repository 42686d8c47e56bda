use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use taskbell_core::{
    config::LEAD_WINDOW_MINUTES,
    types::{Priority, Task},
    Clock, SystemClock,
};
use tracing::{debug, info};

/// Urgency contribution of each priority.
const HIGH_WEIGHT: i32 = 50;
const MEDIUM_WEIGHT: i32 = 30;
const LOW_WEIGHT: i32 = 10;

/// Time-to-due buckets, first match wins: (upper bound in whole hours, bonus).
const URGENCY_BUCKETS: [(i64, i32); 5] = [(-1, 100), (1, 80), (6, 60), (24, 40), (72, 20)];

/// Every predicate for one task at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskAssessment {
    pub task_id: i64,
    pub evaluated_at: DateTime<Utc>,
    pub should_execute: bool,
    pub overdue: bool,
    pub high_priority: bool,
    pub urgency_score: i32,
    pub needs_immediate_attention: bool,
}

/// Time- and attribute-based reminder rules.
///
/// Stateless apart from the clock: each `*_at` method is a pure function of
/// the task and the instant passed in; the plain variants read the clock.
#[derive(Clone)]
pub struct RuleEngine {
    clock: Arc<dyn Clock>,
}

impl RuleEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn should_execute(&self, task: &Task) -> bool {
        self.should_execute_at(task, self.clock.now())
    }

    /// True iff the task is open, has a due date, and is due within the next
    /// [`LEAD_WINDOW_MINUTES`] (inclusive). Overdue tasks never qualify.
    pub fn should_execute_at(&self, task: &Task, now: DateTime<Utc>) -> bool {
        debug!(task_id = %task.id, "evaluating execution rules");

        if task.completed {
            debug!(task_id = %task.id, "task already completed");
            return false;
        }

        let Some(due) = task.due_instant() else {
            debug!(task_id = %task.id, "task has no due date");
            return false;
        };

        if due < now {
            debug!(task_id = %task.id, "task is overdue");
            return false;
        }

        let minutes_until_due = (due - now).num_minutes();
        let due_soon = (0..=LEAD_WINDOW_MINUTES).contains(&minutes_until_due);

        if due_soon {
            info!(task_id = %task.id, minutes_until_due, "task meets execution criteria");
        } else {
            debug!(task_id = %task.id, minutes_until_due, "task not due soon enough");
        }
        due_soon
    }

    pub fn is_overdue(&self, task: &Task) -> bool {
        self.is_overdue_at(task, self.clock.now())
    }

    /// Due date strictly before today's date and not completed. A task due
    /// today is not overdue even after midnight has passed.
    pub fn is_overdue_at(&self, task: &Task, now: DateTime<Utc>) -> bool {
        let overdue = !task.completed && task.due_date.is_some_and(|d| d < now.date_naive());
        if overdue {
            debug!(task_id = %task.id, "task is overdue");
        }
        overdue
    }

    pub fn is_high_priority(&self, task: &Task) -> bool {
        task.priority == Some(Priority::High)
    }

    pub fn calculate_urgency_score(&self, task: &Task) -> i32 {
        self.calculate_urgency_score_at(task, self.clock.now())
    }

    /// Priority weight plus a time-to-due bonus. Completed or undated tasks
    /// score 0.
    pub fn calculate_urgency_score_at(&self, task: &Task, now: DateTime<Utc>) -> i32 {
        if task.completed {
            return 0;
        }
        let Some(due) = task.due_instant() else {
            return 0;
        };

        let weight = match task.priority {
            Some(Priority::High) => HIGH_WEIGHT,
            Some(Priority::Medium) => MEDIUM_WEIGHT,
            Some(Priority::Low) => LOW_WEIGHT,
            None => 0,
        };

        // Whole hours, truncated toward zero.
        let hours_until_due = (due - now).num_hours();
        let bonus = URGENCY_BUCKETS
            .iter()
            .find(|(limit, _)| hours_until_due <= *limit)
            .map_or(0, |(_, bonus)| *bonus);

        let score = weight + bonus;
        debug!(task_id = %task.id, score, "urgency score");
        score
    }

    pub fn needs_immediate_attention(&self, task: &Task) -> bool {
        self.needs_immediate_attention_at(task, self.clock.now())
    }

    pub fn needs_immediate_attention_at(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if task.completed {
            return false;
        }

        let immediate = self.is_overdue_at(task, now)
            || (self.is_high_priority(task) && self.should_execute_at(task, now));

        if immediate {
            info!(task_id = %task.id, "task needs immediate attention");
        }
        immediate
    }

    /// Evaluate every rule against a single clock reading.
    pub fn evaluate(&self, task: &Task) -> TaskAssessment {
        self.evaluate_at(task, self.clock.now())
    }

    /// Assess every task at one clock reading, most urgent first. Ties go
    /// to tasks needing immediate attention, then to the lower id.
    pub fn rank_by_urgency(&self, tasks: &[Task]) -> Vec<TaskAssessment> {
        let now = self.clock.now();
        let mut ranked: Vec<TaskAssessment> =
            tasks.iter().map(|t| self.evaluate_at(t, now)).collect();
        ranked.sort_by(|a, b| {
            b.urgency_score
                .cmp(&a.urgency_score)
                .then(b.needs_immediate_attention.cmp(&a.needs_immediate_attention))
                .then(a.task_id.cmp(&b.task_id))
        });
        ranked
    }

    fn evaluate_at(&self, task: &Task, now: DateTime<Utc>) -> TaskAssessment {
        TaskAssessment {
            task_id: task.id.get(),
            evaluated_at: now,
            should_execute: self.should_execute_at(task, now),
            overdue: self.is_overdue_at(task, now),
            high_priority: self.is_high_priority(task),
            urgency_score: self.calculate_urgency_score_at(task, now),
            needs_immediate_attention: self.needs_immediate_attention_at(task, now),
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
