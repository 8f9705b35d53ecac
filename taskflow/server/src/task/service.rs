use std::sync::Arc;

use super::query::{TaskFilter, TaskPredicates, TaskQuery};
use super::store::TaskStore;
use super::{NewTask, Task, TaskId, TaskPage, TaskPriority, TaskRequest, TaskResponse};
use super::{TaskServiceError, TaskStatistics, TaskStatus};
use crate::clock::Clock;

/// Shared handles the task handlers build a [`TaskService`] from.
#[derive(Clone)]
pub struct TaskState {
    pub store: Arc<dyn TaskStore>,
    pub clock: Arc<dyn Clock>,
}

impl TaskState {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn service(&self) -> TaskService<'_> {
        TaskService::new(self.store.as_ref(), self.clock.as_ref())
    }
}

pub struct TaskService<'a> {
    store: &'a dyn TaskStore,
    clock: &'a dyn Clock,
}

impl<'a> TaskService<'a> {
    pub fn new(store: &'a dyn TaskStore, clock: &'a dyn Clock) -> TaskService<'a> {
        TaskService { store, clock }
    }

    fn to_response(&self, task: Task) -> TaskResponse {
        TaskResponse::from_task(task, self.clock.today())
    }

    async fn find_task(&self, id: TaskId) -> Result<Task, TaskServiceError> {
        self.store.get_by_id(id).await?.ok_or_else(|| {
            tracing::warn!("Task not found with ID: {}", id);
            TaskServiceError::NotFound(id)
        })
    }

    /// Creates a new task.
    ///
    /// # Arguments
    ///
    /// * `request` - The unvalidated task fields.
    ///
    /// # Returns
    ///
    /// A `Result` containing the stored task, or `ValidationFailed` /
    /// `InvalidArgument` when the request is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(&self, request: TaskRequest) -> Result<TaskResponse, TaskServiceError> {
        tracing::info!(
            "Creating new task with title: {}",
            request.title.as_deref().unwrap_or_default()
        );
        let changes = request.into_changes()?;

        let task = self
            .store
            .insert(NewTask::new(changes, self.clock.now()))
            .await?;
        tracing::info!("Task created successfully with ID: {}", task.id());
        Ok(self.to_response(task))
    }

    /// Retrieves a task by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, id: TaskId) -> Result<TaskResponse, TaskServiceError> {
        let task = self.find_task(id).await?;
        Ok(self.to_response(task))
    }

    /// Replaces the editable fields of a task.
    ///
    /// The request is validated before the task is looked up, so an invalid
    /// request for a missing ID reports the validation problem.
    #[tracing::instrument(skip(self))]
    pub async fn update_task(
        &self,
        id: TaskId,
        request: TaskRequest,
    ) -> Result<TaskResponse, TaskServiceError> {
        let changes = request.into_changes()?;
        let mut task = self.find_task(id).await?;

        task.apply_update(changes, self.clock.now());
        let updated_task = self.store.save(task).await?;
        tracing::info!("Task updated successfully with ID: {}", updated_task.id());
        Ok(self.to_response(updated_task))
    }

    /// Deletes a task by its ID.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, id: TaskId) -> Result<(), TaskServiceError> {
        if !self.store.exists_by_id(id).await? || !self.store.delete_by_id(id).await? {
            tracing::warn!("Task not found with ID: {}", id);
            return Err(TaskServiceError::NotFound(id));
        }
        tracing::info!("Task deleted successfully with ID: {}", id);
        Ok(())
    }

    /// Lists one page of tasks matching the filter.
    #[tracing::instrument(skip(self))]
    pub async fn get_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, TaskServiceError> {
        let query = TaskQuery::resolve(filter, self.clock.today())?;
        let (tasks, total) = self.store.query(&query).await?;

        let content = tasks
            .into_iter()
            .map(|task| self.to_response(task))
            .collect();
        Ok(TaskPage::new(content, total, query.page.page, query.page.size))
    }

    /// Flips a task between pending and completed.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_task_completion(&self, id: TaskId) -> Result<TaskResponse, TaskServiceError> {
        let mut task = self.find_task(id).await?;

        task.toggle_completion(self.clock.now());
        let updated_task = self.store.save(task).await?;
        tracing::info!(
            "Task completion status toggled for ID: {} to status: {}",
            id,
            updated_task.status()
        );
        Ok(self.to_response(updated_task))
    }

    /// Lists every task that is overdue today, earliest due date first.
    #[tracing::instrument(skip(self))]
    pub async fn get_overdue_tasks(&self) -> Result<Vec<TaskResponse>, TaskServiceError> {
        let predicates = TaskPredicates::all().overdue_on(self.clock.today());
        let tasks = self.store.find_where(&predicates).await?;
        Ok(tasks.into_iter().map(|task| self.to_response(task)).collect())
    }

    /// Counts tasks by status, priority and overdue state.
    #[tracing::instrument(skip(self))]
    pub async fn get_statistics(&self) -> Result<TaskStatistics, TaskServiceError> {
        let today = self.clock.today();

        let total_tasks = self.store.count_where(&TaskPredicates::all()).await?;
        let pending_tasks = self
            .store
            .count_where(&TaskPredicates::all().with_status(TaskStatus::Pending))
            .await?;
        let completed_tasks = self
            .store
            .count_where(&TaskPredicates::all().with_status(TaskStatus::Completed))
            .await?;
        let high_priority_tasks = self
            .store
            .count_where(&TaskPredicates::all().with_priority(TaskPriority::High))
            .await?;
        let overdue_tasks = self
            .store
            .count_where(&TaskPredicates::all().overdue_on(today))
            .await?;

        Ok(TaskStatistics {
            total_tasks,
            pending_tasks,
            completed_tasks,
            overdue_tasks,
            high_priority_tasks,
        })
    }
}
