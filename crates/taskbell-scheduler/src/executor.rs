use std::{fmt, str::FromStr, sync::Arc};

use taskbell_core::{reminder::ReminderMessage, types::Task, UserStore};
use taskbell_notify::Notifier;
use tracing::{error, info, warn};

use crate::error::ExecutionError;

/// Side effects a task reminder can trigger. Only `Email` is wired to a
/// notifier today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Email,
    Notification,
    Sms,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Email => "EMAIL",
            ActionKind::Notification => "NOTIFICATION",
            ActionKind::Sms => "SMS",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMAIL" => Ok(ActionKind::Email),
            "NOTIFICATION" => Ok(ActionKind::Notification),
            "SMS" => Ok(ActionKind::Sms),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// Why a reminder was not sent. Logged, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// The task did not exist (deleted between scheduling and firing).
    MissingTask,
    /// The task's owner id does not resolve to a user.
    OwnerNotFound,
    /// The owner's account is disabled.
    OwnerDisabled,
    /// The owner has no usable contact address.
    MissingContactAddress,
    /// The action kind is known but has no channel yet.
    Deferred(ActionKind),
    /// The action tag did not parse.
    UnsupportedAction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Dispatched,
    Skipped(Anomaly),
}

impl ExecutionOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, ExecutionOutcome::Dispatched)
    }
}

/// Resolves the owner of a task and hands the rendered reminder to the
/// notifier.
#[derive(Clone)]
pub struct ActionExecutor {
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
}

impl ActionExecutor {
    pub fn new(users: Arc<dyn UserStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { users, notifier }
    }

    /// Send the reminder for `task` to its owner.
    pub async fn execute(&self, task: Option<&Task>) -> Result<ExecutionOutcome, ExecutionError> {
        let Some(task) = task else {
            warn!("no task supplied to executor");
            return Ok(ExecutionOutcome::Skipped(Anomaly::MissingTask));
        };

        info!(task_id = %task.id, title = %task.title, "executing reminder");

        let Some(owner) = self.users.find_user_by_id(task.owner_id)? else {
            error!(task_id = %task.id, owner_id = %task.owner_id, "task owner not found");
            return Ok(ExecutionOutcome::Skipped(Anomaly::OwnerNotFound));
        };

        if !owner.enabled {
            info!(task_id = %task.id, owner_id = %owner.id, "owner disabled, not reminding");
            return Ok(ExecutionOutcome::Skipped(Anomaly::OwnerDisabled));
        }

        let Some(address) = owner.contact_address() else {
            warn!(task_id = %task.id, owner_id = %owner.id, "owner has no contact address");
            return Ok(ExecutionOutcome::Skipped(Anomaly::MissingContactAddress));
        };

        let message = ReminderMessage::render(task, &owner, address);
        match self.notifier.send(&message).await {
            Ok(()) => {
                info!(
                    task_id = %task.id,
                    channel = self.notifier.channel_name(),
                    to = %message.to,
                    "reminder dispatched"
                );
                Ok(ExecutionOutcome::Dispatched)
            }
            Err(e) => {
                error!(
                    task_id = %task.id,
                    channel = self.notifier.channel_name(),
                    error = %e,
                    "reminder dispatch failed"
                );
                Err(ExecutionError::Dispatch {
                    task_id: task.id.get(),
                    source: e,
                })
            }
        }
    }

    /// Route by a free-form action tag. Unknown tags are an anomaly, not an
    /// error.
    pub async fn execute_action(
        &self,
        task: Option<&Task>,
        tag: &str,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        match tag.parse::<ActionKind>() {
            Ok(kind) => self.execute_kind(task, kind).await,
            Err(_) => {
                warn!(action = %tag, "unknown action type");
                Ok(ExecutionOutcome::Skipped(Anomaly::UnsupportedAction(
                    tag.to_string(),
                )))
            }
        }
    }

    pub async fn execute_kind(
        &self,
        task: Option<&Task>,
        kind: ActionKind,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        match kind {
            ActionKind::Email => self.execute(task).await,
            ActionKind::Notification | ActionKind::Sms => {
                info!(action = %kind, "action not yet implemented");
                Ok(ExecutionOutcome::Skipped(Anomaly::Deferred(kind)))
            }
        }
    }
}
