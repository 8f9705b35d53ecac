use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::task::{self, TaskState};

#[derive(OpenApi)]
#[openapi(info(
    title = "taskflow",
    description = "Task management REST API",
    version = "0.1.0"
))]
pub struct ApiDoc;

/// Root document merged with every versioned API.
pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(task::api::v1::TasksApi::openapi());
    root
}

/// Creates the API routes for JSON API endpoints.
pub fn create_api_router(task_state: Arc<TaskState>) -> Router {
    let tasks_router = task::api::v1::create_api_router(task_state);
    Router::new().nest("/api/v1", tasks_router)
}
