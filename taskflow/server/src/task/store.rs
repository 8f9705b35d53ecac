use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::*;
use std::sync::Arc;

use super::query::{OverdueFilter, SortDirection, SortField, TaskPredicates, TaskQuery, TaskSort};
use super::{NewTask, Task, TaskId};
use crate::entities::sea_orm_active_enums::{
    TaskPriority as DbTaskPriority, TaskStatus as DbTaskStatus,
};
use crate::entities::task;

/// Persistence operations the task service relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a new task and returns it with its assigned ID.
    async fn insert(&self, new_task: NewTask) -> Result<Task, DbErr>;

    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>, DbErr>;

    /// Writes every field of an existing task.
    async fn save(&self, task: Task) -> Result<Task, DbErr>;

    /// Returns `false` when no row had the given ID.
    async fn delete_by_id(&self, id: TaskId) -> Result<bool, DbErr>;

    async fn exists_by_id(&self, id: TaskId) -> Result<bool, DbErr>;

    /// Returns the requested page together with the total number of matches.
    async fn query(&self, query: &TaskQuery) -> Result<(Vec<Task>, u64), DbErr>;

    async fn count_where(&self, predicates: &TaskPredicates) -> Result<u64, DbErr>;

    /// Returns all matches ordered by due date, then ID.
    async fn find_where(&self, predicates: &TaskPredicates) -> Result<Vec<Task>, DbErr>;
}

/// [`TaskStore`] backed by the `tasks` table.
#[derive(Clone, Debug)]
pub struct SeaOrmTaskStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmTaskStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

/// Escapes LIKE wildcards so user text is matched literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn search_condition(search: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
    Condition::any()
        .add(
            Expr::expr(Func::lower(Expr::col(task::Column::Title)))
                .like(LikeExpr::new(pattern.clone()).escape('\\')),
        )
        .add(
            Expr::expr(Func::lower(Expr::col(task::Column::Description)))
                .like(LikeExpr::new(pattern).escape('\\')),
        )
}

fn overdue_condition(filter: OverdueFilter) -> Condition {
    if filter.overdue {
        Condition::all()
            .add(task::Column::Status.eq(DbTaskStatus::Pending))
            .add(task::Column::DueDate.lt(filter.as_of))
    } else {
        // Spelled out rather than negated: a NULL due date must count as "not overdue".
        Condition::any()
            .add(task::Column::Status.ne(DbTaskStatus::Pending))
            .add(task::Column::DueDate.is_null())
            .add(task::Column::DueDate.gte(filter.as_of))
    }
}

fn condition(predicates: &TaskPredicates) -> Condition {
    Condition::all()
        .add_option(predicates.search.as_deref().map(search_condition))
        .add_option(
            predicates
                .status
                .map(|status| task::Column::Status.eq(DbTaskStatus::from(status))),
        )
        .add_option(
            predicates
                .priority
                .map(|priority| task::Column::Priority.eq(DbTaskPriority::from(priority))),
        )
        .add_option(
            predicates
                .due_date_from
                .map(|from| task::Column::DueDate.gte(from)),
        )
        .add_option(predicates.due_date_to.map(|to| task::Column::DueDate.lte(to)))
        .add_option(predicates.overdue.map(overdue_condition))
}

fn filtered(predicates: &TaskPredicates) -> Select<task::Entity> {
    if predicates.is_empty() {
        task::Entity::find()
    } else {
        task::Entity::find().filter(condition(predicates))
    }
}

fn sorted(select: Select<task::Entity>, sort: TaskSort) -> Select<task::Entity> {
    let column = match sort.field {
        SortField::Priority => task::Column::Priority,
        SortField::DueDate => task::Column::DueDate,
        SortField::Title => task::Column::Title,
        SortField::Status => task::Column::Status,
        SortField::CreatedAt => task::Column::CreatedAt,
        SortField::UpdatedAt => task::Column::UpdatedAt,
    };
    let order = match sort.direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    };
    // ID breaks ties so pages never overlap.
    select.order_by(column, order).order_by_asc(task::Column::Id)
}

fn active_model(task: &Task) -> task::ActiveModel {
    task::ActiveModel {
        id: ActiveValue::Unchanged(task.id),
        title: ActiveValue::Set(task.title.clone()),
        description: ActiveValue::Set(task.description.clone()),
        status: ActiveValue::Set(task.status.into()),
        priority: ActiveValue::Set(task.priority.into()),
        due_date: ActiveValue::Set(task.due_date),
        created_at: ActiveValue::Unchanged(task.created_at.into()),
        updated_at: ActiveValue::Set(task.updated_at.into()),
    }
}

#[async_trait]
impl TaskStore for SeaOrmTaskStore {
    #[tracing::instrument(skip(self))]
    async fn insert(&self, new_task: NewTask) -> Result<Task, DbErr> {
        let changes = new_task.changes;
        let active_model = task::ActiveModel {
            title: ActiveValue::Set(changes.title),
            description: ActiveValue::Set(changes.description),
            status: ActiveValue::Set(changes.status.into()),
            priority: ActiveValue::Set(changes.priority.into()),
            due_date: ActiveValue::Set(changes.due_date),
            created_at: ActiveValue::Set(new_task.created_at.into()),
            updated_at: ActiveValue::Set(new_task.created_at.into()),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db.as_ref()).await?;
        Ok(Task::from(created_model))
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>, DbErr> {
        let model = task::Entity::find_by_id(id).one(self.db.as_ref()).await?;
        Ok(model.map(Task::from))
    }

    #[tracing::instrument(skip(self))]
    async fn save(&self, task: Task) -> Result<Task, DbErr> {
        let updated_model = active_model(&task).update(self.db.as_ref()).await?;
        Ok(Task::from(updated_model))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_by_id(&self, id: TaskId) -> Result<bool, DbErr> {
        let result = task::Entity::delete_by_id(id).exec(self.db.as_ref()).await?;
        Ok(result.rows_affected > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn exists_by_id(&self, id: TaskId) -> Result<bool, DbErr> {
        let count = task::Entity::find_by_id(id).count(self.db.as_ref()).await?;
        Ok(count > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn query(&self, query: &TaskQuery) -> Result<(Vec<Task>, u64), DbErr> {
        let paginator = sorted(filtered(&query.predicates), query.sort)
            .paginate(self.db.as_ref(), query.page.size);
        let total = paginator.num_items().await?;
        if query.page.offset().is_none() {
            // Far past the last row; the offset cannot be expressed in SQL.
            return Ok((Vec::new(), total));
        }
        let tasks = paginator
            .fetch_page(query.page.page)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok((tasks, total))
    }

    #[tracing::instrument(skip(self))]
    async fn count_where(&self, predicates: &TaskPredicates) -> Result<u64, DbErr> {
        filtered(predicates).count(self.db.as_ref()).await
    }

    #[tracing::instrument(skip(self))]
    async fn find_where(&self, predicates: &TaskPredicates) -> Result<Vec<Task>, DbErr> {
        let tasks = filtered(predicates)
            .order_by_asc(task::Column::DueDate)
            .order_by_asc(task::Column::Id)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }
}
