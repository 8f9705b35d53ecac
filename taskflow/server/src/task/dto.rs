use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use super::{Task, TaskChanges, TaskId, TaskPriority, TaskServiceError, TaskStatus};

/// Payload for creating or fully replacing a task.
///
/// `status` and `priority` are kept as raw strings until validation so that a
/// missing value is reported per field and an unknown value as an invalid argument.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    /// Task title, 1 to 255 characters
    #[serde(default)]
    #[validate(
        required(message = "Task title is required"),
        custom(function = "validate_not_blank"),
        length(
            min = 1,
            max = 255,
            message = "Task title must be between 1 and 255 characters"
        )
    )]
    #[schema(example = "Ship report")]
    pub title: Option<String>,
    /// Optional description, at most 1000 characters
    #[serde(default)]
    #[validate(length(max = 1000, message = "Task description must not exceed 1000 characters"))]
    pub description: Option<String>,
    /// `PENDING` or `COMPLETED`
    #[serde(default)]
    #[validate(required(message = "Task status is required"))]
    #[schema(example = "PENDING")]
    pub status: Option<String>,
    /// `LOW`, `MEDIUM` or `HIGH`
    #[serde(default)]
    #[validate(required(message = "Task priority is required"))]
    #[schema(example = "MEDIUM")]
    pub priority: Option<String>,
    /// Optional due date (ISO-8601)
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Task title is required")));
    }
    Ok(())
}

/// Flattens validator output into one message per field.
fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, String> {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, field_errors)| {
            field_errors.first().map(|error| {
                let message = error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                (field.to_string(), message)
            })
        })
        .collect()
}

impl TaskRequest {
    /// Validates the request and converts it into typed task fields.
    pub fn into_changes(self) -> Result<TaskChanges, TaskServiceError> {
        self.validate()
            .map_err(|errors| TaskServiceError::ValidationFailed(field_messages(&errors)))?;

        let status = self.status.as_deref().unwrap_or_default().parse::<TaskStatus>()?;
        let priority = self
            .priority
            .as_deref()
            .unwrap_or_default()
            .parse::<TaskPriority>()?;

        Ok(TaskChanges {
            title: self.title.unwrap_or_default(),
            description: self.description,
            status,
            priority,
            due_date: self.due_date,
        })
    }
}

/// JSON representation of a task, including state derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    /// Unique identifier for the task
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Pending with a due date before today (UTC)
    pub overdue: bool,
    /// Status is `COMPLETED`
    pub completed: bool,
}

impl TaskResponse {
    /// Builds the response, evaluating `overdue` against `today`.
    pub fn from_task(task: Task, today: NaiveDate) -> Self {
        let overdue = task.is_overdue(today);
        let completed = task.is_completed();
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            created_at: task.created_at,
            updated_at: task.updated_at,
            overdue,
            completed,
        }
    }
}

/// One page of a task listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    /// Tasks on the requested page
    pub content: Vec<TaskResponse>,
    /// Number of tasks matching the filter across all pages
    pub total_elements: u64,
    pub total_pages: u64,
    /// Zero-based page index
    pub page: u64,
    /// Requested page length
    pub size: u64,
}

impl TaskPage {
    pub fn new(content: Vec<TaskResponse>, total_elements: u64, page: u64, size: u64) -> Self {
        Self {
            content,
            total_elements,
            total_pages: total_elements.div_ceil(size.max(1)),
            page,
            size,
        }
    }
}

/// Summary counts over all tasks. The counts overlap and are not a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatistics {
    pub total_tasks: u64,
    pub pending_tasks: u64,
    pub completed_tasks: u64,
    pub overdue_tasks: u64,
    pub high_priority_tasks: u64,
}
