use crate::entities::{sea_orm_active_enums, task};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub mod api;
pub mod dto;
pub mod query;
pub mod service;
pub mod store;

pub use dto::{TaskPage, TaskRequest, TaskResponse, TaskStatistics};
pub use query::{TaskFilter, TaskPredicates, TaskQuery};
pub use service::{TaskService, TaskState};
pub use store::{SeaOrmTaskStore, TaskStore};

/// Database identifier of a task.
pub type TaskId = i64;

/// Completion state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

/// Priority of a task. Variants are declared in ascending order.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Completed => "COMPLETED",
        }
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskServiceError;

    /// Parses a status name, ignoring case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [TaskStatus::Pending, TaskStatus::Completed]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| TaskServiceError::InvalidArgument(format!("Invalid task status: {value}")))
    }
}

impl FromStr for TaskPriority {
    type Err = TaskServiceError;

    /// Parses a priority name, ignoring case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High]
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                TaskServiceError::InvalidArgument(format!("Invalid task priority: {value}"))
            })
    }
}

impl From<sea_orm_active_enums::TaskStatus> for TaskStatus {
    fn from(status: sea_orm_active_enums::TaskStatus) -> Self {
        match status {
            sea_orm_active_enums::TaskStatus::Pending => TaskStatus::Pending,
            sea_orm_active_enums::TaskStatus::Completed => TaskStatus::Completed,
        }
    }
}

impl From<TaskStatus> for sea_orm_active_enums::TaskStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => sea_orm_active_enums::TaskStatus::Pending,
            TaskStatus::Completed => sea_orm_active_enums::TaskStatus::Completed,
        }
    }
}

impl From<sea_orm_active_enums::TaskPriority> for TaskPriority {
    fn from(priority: sea_orm_active_enums::TaskPriority) -> Self {
        match priority {
            sea_orm_active_enums::TaskPriority::Low => TaskPriority::Low,
            sea_orm_active_enums::TaskPriority::Medium => TaskPriority::Medium,
            sea_orm_active_enums::TaskPriority::High => TaskPriority::High,
        }
    }
}

impl From<TaskPriority> for sea_orm_active_enums::TaskPriority {
    fn from(priority: TaskPriority) -> Self {
        match priority {
            TaskPriority::Low => sea_orm_active_enums::TaskPriority::Low,
            TaskPriority::Medium => sea_orm_active_enums::TaskPriority::Medium,
            TaskPriority::High => sea_orm_active_enums::TaskPriority::High,
        }
    }
}

/// Validated, user-editable fields of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
}

/// A task that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub changes: TaskChanges,
    pub created_at: DateTime<Utc>,
}

impl NewTask {
    pub fn new(changes: TaskChanges, now: DateTime<Utc>) -> Self {
        Self {
            changes,
            created_at: now,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: TaskId,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Rebuilds a stored task from its identifier and creation data.
    pub fn from_new(id: TaskId, new_task: NewTask) -> Self {
        let NewTask {
            changes,
            created_at,
        } = new_task;
        Self {
            id,
            title: changes.title,
            description: changes.description,
            status: changes.status,
            priority: changes.priority,
            due_date: changes.due_date,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when the task is still pending and its due date lies strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == TaskStatus::Pending && self.due_date.is_some_and(|due| due < today)
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Flips the status between pending and completed.
    pub fn toggle_completion(&mut self, now: DateTime<Utc>) {
        self.status = match self.status {
            TaskStatus::Pending => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Pending,
        };
        self.touch(now);
    }

    /// Overwrites every editable field. The identifier and creation time are kept.
    pub fn apply_update(&mut self, changes: TaskChanges, now: DateTime<Utc>) {
        self.title = changes.title;
        self.description = changes.description;
        self.status = changes.status;
        self.priority = changes.priority;
        self.due_date = changes.due_date;
        self.touch(now);
    }

    /// Moves `updated_at` forward, by at least one microsecond.
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            status: model.status.into(),
            priority: model.priority.into(),
            due_date: model.due_date,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// No task exists with the given ID.
    #[error("Task not found with ID: {0}")]
    NotFound(TaskId),
    /// One or more request fields are invalid, keyed by field name.
    #[error("Invalid input parameters: {}", format_field_errors(.0))]
    ValidationFailed(BTreeMap<String, String>),
    /// The input could be read but holds a value outside the accepted set.
    #[error("{0}")]
    InvalidArgument(String),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

fn format_field_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}
