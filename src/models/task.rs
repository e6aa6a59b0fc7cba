use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{EntityId, Identifiable};

/// Lifecycle status as persisted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    ToDo,
    InProgress,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::ToDo => write!(f, "TO_DO"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Done => write!(f, "DONE"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TO_DO" => Ok(TaskStatus::ToDo),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// Status shown to the user. `Overdue` is derived on the client and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    ToDo,
    InProgress,
    Done,
    Overdue,
}

impl From<TaskStatus> for DisplayStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::ToDo => DisplayStatus::ToDo,
            TaskStatus::InProgress => DisplayStatus::InProgress,
            TaskStatus::Done => DisplayStatus::Done,
        }
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayStatus::ToDo => write!(f, "TO_DO"),
            DisplayStatus::InProgress => write!(f, "IN_PROGRESS"),
            DisplayStatus::Done => write!(f, "DONE"),
            DisplayStatus::Overdue => write!(f, "OVERDUE"),
        }
    }
}

impl std::str::FromStr for DisplayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("OVERDUE") {
            return Ok(DisplayStatus::Overdue);
        }
        s.parse::<TaskStatus>().map(DisplayStatus::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskRole {
    Owner,
    Assignee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub user_id: EntityId,
    pub username: String,
    pub task_role: TaskRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub owner_id: EntityId,
    pub status: TaskStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_comment: Option<String>,
    #[serde(default)]
    pub assignments: Vec<TaskAssignment>,
}

impl Task {
    pub fn is_owner(&self, user_id: EntityId) -> bool {
        self.owner_id == user_id
    }

    pub fn is_assignee(&self, user_id: EntityId) -> bool {
        self.assignments
            .iter()
            .any(|a| a.user_id == user_id && a.task_role == TaskRole::Assignee)
    }

    pub fn owner_assignment(&self) -> Option<&TaskAssignment> {
        self.assignments
            .iter()
            .find(|a| a.task_role == TaskRole::Owner)
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

impl Identifiable for Task {
    fn key(&self) -> EntityId {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignee_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl UpdateTaskRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.due_date.is_none()
    }

    /// Only the deadline changes.
    pub fn is_deadline_only(&self) -> bool {
        self.due_date.is_some() && self.title.is_none() && self.description.is_none()
    }
}

/// PATCH /tasks/{id}/status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAssigneesRequest {
    pub user_ids: Vec<EntityId>,
}
