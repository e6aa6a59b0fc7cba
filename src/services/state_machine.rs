use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::errors::ClientError;
use crate::models::{DisplayStatus, EntityId, StatusChangeRequest, Task, TaskStatus};

/// Maximum length of the free-text comment recorded when a task is completed.
pub const COMPLETION_COMMENT_MAX_CHARS: usize = 300;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: TaskStatus, to: DisplayStatus },
    #[error("Completing a task requires confirmation")]
    ConfirmationRequired,
    #[error("Completion comment is {len} characters, the limit is {max}")]
    CommentTooLong { len: usize, max: usize },
}

impl From<TransitionError> for ClientError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, to } => ClientError::InvalidTransition {
                from,
                to: to.to_string(),
            },
            other => ClientError::Validation(other.to_string()),
        }
    }
}

static OPEN_TRANSITIONS: [TaskStatus; 3] = [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done];
static DONE_TRANSITIONS: [TaskStatus; 1] = [TaskStatus::Done];

/// Task status state machine: TO_DO and IN_PROGRESS move freely between each other
/// and into DONE, which is terminal.
pub struct TaskLifecycle;

impl TaskLifecycle {
    /// Statuses reachable from `status`, including staying put.
    pub fn transitions_from(status: TaskStatus) -> &'static [TaskStatus] {
        match status {
            TaskStatus::ToDo | TaskStatus::InProgress => &OPEN_TRANSITIONS,
            TaskStatus::Done => &DONE_TRANSITIONS,
        }
    }

    /// Always computed from the persisted status, never from the OVERDUE overlay.
    pub fn available_transitions(task: &Task) -> Vec<TaskStatus> {
        Self::transitions_from(task.status).to_vec()
    }

    pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
        task.status != TaskStatus::Done && task.due_date < now
    }

    pub fn display_status(task: &Task, now: DateTime<Utc>) -> DisplayStatus {
        if Self::is_overdue(task, now) {
            DisplayStatus::Overdue
        } else {
            task.status.into()
        }
    }

    /// Validates a requested target. OVERDUE is never a valid target.
    pub fn validate_transition(
        from: TaskStatus,
        to: DisplayStatus,
    ) -> Result<TaskStatus, TransitionError> {
        let target = match to {
            DisplayStatus::ToDo => TaskStatus::ToDo,
            DisplayStatus::InProgress => TaskStatus::InProgress,
            DisplayStatus::Done => TaskStatus::Done,
            DisplayStatus::Overdue => {
                return Err(TransitionError::InvalidTransition { from, to });
            }
        };

        if Self::transitions_from(from).contains(&target) {
            Ok(target)
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// Builds the request for a non-completing status change. Returns `None` when
    /// the task already has the requested status. DONE must go through
    /// [`TaskLifecycle::begin_completion`].
    pub fn status_change(
        task: &Task,
        to: DisplayStatus,
    ) -> Result<Option<StatusChangeRequest>, TransitionError> {
        let target = Self::validate_transition(task.status, to)?;
        if target == task.status {
            return Ok(None);
        }
        if target == TaskStatus::Done {
            return Err(TransitionError::ConfirmationRequired);
        }

        Ok(Some(StatusChangeRequest {
            status: target,
            completion_comment: None,
        }))
    }

    /// First step of completing a task: the confirmation prompt.
    pub fn begin_completion(task: &Task) -> Result<CompletionPrompt, TransitionError> {
        if task.status == TaskStatus::Done {
            return Err(TransitionError::InvalidTransition {
                from: TaskStatus::Done,
                to: DisplayStatus::Done,
            });
        }
        Ok(CompletionPrompt {
            task_id: task.id,
            from: task.status,
        })
    }
}

/// Awaiting the user's yes/no on completing a task.
#[derive(Debug)]
#[must_use]
pub struct CompletionPrompt {
    task_id: EntityId,
    from: TaskStatus,
}

impl CompletionPrompt {
    pub fn task_id(&self) -> EntityId {
        self.task_id
    }

    pub fn confirm(self) -> CompletionComment {
        CompletionComment {
            task_id: self.task_id,
            from: self.from,
        }
    }

    /// Abandons the completion; nothing is sent.
    pub fn cancel(self) {}
}

/// Confirmed; awaiting the optional completion comment.
#[derive(Debug)]
#[must_use]
pub struct CompletionComment {
    task_id: EntityId,
    from: TaskStatus,
}

impl CompletionComment {
    pub fn with_comment(
        self,
        comment: impl Into<String>,
    ) -> Result<CompletionRequest, TransitionError> {
        let comment = comment.into();
        let len = comment.chars().count();
        if len > COMPLETION_COMMENT_MAX_CHARS {
            return Err(TransitionError::CommentTooLong {
                len,
                max: COMPLETION_COMMENT_MAX_CHARS,
            });
        }
        Ok(CompletionRequest {
            task_id: self.task_id,
            from: self.from,
            comment,
        })
    }

    pub fn skip(self) -> CompletionRequest {
        CompletionRequest {
            task_id: self.task_id,
            from: self.from,
            comment: String::new(),
        }
    }
}

/// A fully confirmed completion, the only way to ask the server for DONE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    task_id: EntityId,
    from: TaskStatus,
    comment: String,
}

impl CompletionRequest {
    pub fn task_id(&self) -> EntityId {
        self.task_id
    }

    pub fn from_status(&self) -> TaskStatus {
        self.from
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn to_status_change(&self) -> StatusChangeRequest {
        StatusChangeRequest {
            status: TaskStatus::Done,
            completion_comment: Some(self.comment.clone()),
        }
    }
}
