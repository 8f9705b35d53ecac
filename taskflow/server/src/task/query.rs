//! Resolution of list requests into store queries.
//!
//! A [`TaskFilter`] carries the optional, loosely typed parameters of a list
//! request. [`TaskQuery::resolve`] turns it into a fully typed plan: a set of
//! predicates combined with AND, a sort key taken from a closed table, and a
//! page window.

use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use super::{TaskPriority, TaskServiceError, TaskStatus};

pub const DEFAULT_PAGE: u64 = 0;
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// Larger `size` values are clamped to this.
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Query parameters accepted by the task listing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TaskFilter {
    /// Case-insensitive text matched against title or description
    pub search: Option<String>,
    /// `PENDING` or `COMPLETED`
    pub status: Option<String>,
    /// `LOW`, `MEDIUM` or `HIGH`
    pub priority: Option<String>,
    /// Earliest due date, inclusive
    pub due_date_from: Option<NaiveDate>,
    /// Latest due date, inclusive
    pub due_date_to: Option<NaiveDate>,
    /// Only overdue tasks when `true`, none of them when `false`
    pub overdue: Option<bool>,
    /// One of `priority`, `dueDate`, `title`, `status`, `createdAt`, `updatedAt`
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub sort_direction: Option<String>,
    /// Zero-based page index
    pub page: Option<i64>,
    /// Page length, at most 1000
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Priority,
    DueDate,
    Title,
    Status,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Maps a `sortBy` parameter to a sort key. Unknown names fall back to `CreatedAt`.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("priority") => SortField::Priority,
            Some("dueDate") => SortField::DueDate,
            Some("title") => SortField::Title,
            Some("status") => SortField::Status,
            Some("createdAt") => SortField::CreatedAt,
            Some("updatedAt") => SortField::UpdatedAt,
            _ => SortField::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Only `asc` (any case) sorts ascending.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some(direction) if direction.trim().eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSort {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<i64>, size: Option<i64>) -> Result<Self, TaskServiceError> {
        let page = match page {
            None => DEFAULT_PAGE,
            Some(page) => u64::try_from(page).map_err(|_| {
                TaskServiceError::InvalidArgument("Page index must not be less than zero".to_string())
            })?,
        };
        let size = match size {
            None => DEFAULT_PAGE_SIZE,
            Some(size) if size >= 1 => (size as u64).min(MAX_PAGE_SIZE),
            Some(_) => {
                return Err(TaskServiceError::InvalidArgument(
                    "Page size must not be less than one".to_string(),
                ));
            }
        };
        Ok(Self { page, size })
    }

    /// Row offset of the first task on the page, or `None` when it does not
    /// fit a signed 64-bit SQL `OFFSET`.
    pub fn offset(&self) -> Option<u64> {
        self.page
            .checked_mul(self.size)
            .filter(|offset| i64::try_from(*offset).is_ok())
    }
}

/// Treats an empty or whitespace-only parameter as absent.
fn non_blank(param: Option<&str>) -> Option<&str> {
    param.filter(|value| !value.trim().is_empty())
}

/// Restricts results to tasks that are (or are not) overdue on `as_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverdueFilter {
    pub overdue: bool,
    pub as_of: NaiveDate,
}

/// Optional predicates, all of which must hold for a task to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPredicates {
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date_from: Option<NaiveDate>,
    pub due_date_to: Option<NaiveDate>,
    pub overdue: Option<OverdueFilter>,
}

impl TaskPredicates {
    /// Matches every task.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn overdue_on(mut self, as_of: NaiveDate) -> Self {
        self.overdue = Some(OverdueFilter {
            overdue: true,
            as_of,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A resolved list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub predicates: TaskPredicates,
    pub sort: TaskSort,
    pub page: PageRequest,
}

impl TaskQuery {
    /// Resolves a filter against the given calendar date.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown status or priority, a negative
    /// page index, or a page size below one.
    pub fn resolve(filter: &TaskFilter, today: NaiveDate) -> Result<Self, TaskServiceError> {
        let search = non_blank(filter.search.as_deref()).map(str::to_string);
        let status = non_blank(filter.status.as_deref())
            .map(str::parse::<TaskStatus>)
            .transpose()?;
        let priority = non_blank(filter.priority.as_deref())
            .map(str::parse::<TaskPriority>)
            .transpose()?;
        let overdue = filter.overdue.map(|overdue| OverdueFilter {
            overdue,
            as_of: today,
        });

        Ok(Self {
            predicates: TaskPredicates {
                search,
                status,
                priority,
                due_date_from: filter.due_date_from,
                due_date_to: filter.due_date_to,
                overdue,
            },
            sort: TaskSort {
                field: SortField::from_param(filter.sort_by.as_deref()),
                direction: SortDirection::from_param(filter.sort_direction.as_deref()),
            },
            page: PageRequest::new(filter.page, filter.size)?,
        })
    }
}
