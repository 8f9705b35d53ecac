use crate::clock::Clock;
use crate::task::query::TaskFilter;
use crate::task::{
    TaskId, TaskPage, TaskPriority, TaskRequest, TaskResponse, TaskServiceError, TaskState,
    TaskStatistics, TaskStatus,
};
use axum::{
    Router,
    extract::{
        OriginalUri, Path, Query, Request, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

pub const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");
pub const PAGE_NUMBER_HEADER: HeaderName = HeaderName::from_static("x-page-number");
pub const PAGE_SIZE_HEADER: HeaderName = HeaderName::from_static("x-page-size");

const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// JSON body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// When the error was produced (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// HTTP status code
    pub status: u16,
    /// Short error category
    pub error: String,
    pub message: String,
    /// Request path that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Message per rejected field, present for validation failures only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, String>>,
}

impl ErrorResponse {
    fn new(status: StatusCode, error: &str, message: String) -> Self {
        Self {
            timestamp: None,
            status: status.as_u16(),
            error: error.to_string(),
            message,
            path: None,
            validation_errors: None,
        }
    }
}

/// Errors surfaced by the task API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] TaskServiceError),
    #[error("Malformed request body: {0}")]
    JsonBody(#[from] JsonRejection),
    #[error("Malformed query parameters: {0}")]
    Query(#[from] QueryRejection),
    #[error("Malformed path parameter: {0}")]
    Path(#[from] PathRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self {
            ApiError::Service(TaskServiceError::NotFound(id)) => {
                tracing::warn!("Task not found: {}", id);
                ErrorResponse::new(
                    StatusCode::NOT_FOUND,
                    "Task Not Found",
                    TaskServiceError::NotFound(id).to_string(),
                )
            }
            ApiError::Service(TaskServiceError::ValidationFailed(errors)) => {
                tracing::warn!("Validation error: {:?}", errors);
                ErrorResponse {
                    validation_errors: Some(errors),
                    ..ErrorResponse::new(
                        StatusCode::BAD_REQUEST,
                        "Validation Failed",
                        "Invalid input parameters".to_string(),
                    )
                }
            }
            ApiError::Service(TaskServiceError::InvalidArgument(message)) => {
                tracing::warn!("Illegal argument: {}", message);
                ErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid Argument", message)
            }
            ApiError::Service(TaskServiceError::Database(err)) => {
                tracing::error!(error = %err, "Unexpected error occurred");
                ErrorResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
            ApiError::JsonBody(rejection) => {
                ErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid Argument", rejection.body_text())
            }
            ApiError::Query(rejection) => {
                ErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid Argument", rejection.body_text())
            }
            ApiError::Path(rejection) => {
                ErrorResponse::new(StatusCode::BAD_REQUEST, "Invalid Argument", rejection.body_text())
            }
        };

        let status = StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(body.clone())).into_response();
        // Picked up by `error_context_middleware`, which knows the request path.
        response.extensions_mut().insert(body);
        response
    }
}

/// Middleware that stamps error bodies with the current time and the request path.
/// Responses without an [`ErrorResponse`] extension pass through untouched.
pub async fn error_context_middleware(
    State(state): State<Arc<TaskState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    let Some(body) = response.extensions().get::<ErrorResponse>().cloned() else {
        return response;
    };

    let (parts, _) = response.into_parts();
    let body = ErrorResponse {
        timestamp: Some(state.clock.now()),
        path: Some(path),
        ..body
    };
    (parts, Json(body)).into_response()
}

fn pagination_headers(page: &TaskPage) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from(page.total_elements));
    headers.insert(PAGE_NUMBER_HEADER, HeaderValue::from(page.page));
    headers.insert(PAGE_SIZE_HEADER, HeaderValue::from(page.size));
    headers
}

/// Handler for POST /api/v1/tasks - Creates a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    request_body = TaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Invalid task fields", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    body: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let Json(request) = body?;
    let task = state.service().create_task(request).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Handler for GET /api/v1/tasks - Lists one page of tasks.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    params(TaskFilter),
    responses(
        (status = 200, description = "Requested page of tasks", body = TaskPage,
            headers(
                ("X-Total-Count" = u64, description = "Number of matching tasks"),
                ("X-Page-Number" = u64, description = "Zero-based page index"),
                ("X-Page-Size" = u64, description = "Requested page length")
            )
        ),
        (status = 400, description = "Unknown filter value or page window", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_tasks_handler(
    State(state): State<Arc<TaskState>>,
    query: Result<Query<TaskFilter>, QueryRejection>,
) -> Result<(HeaderMap, Json<TaskPage>), ApiError> {
    let Query(filter) = query?;
    let page = state.service().get_tasks(&filter).await?;
    Ok((pagination_headers(&page), Json(page)))
}

/// Handler for GET /api/v1/tasks/overdue - Lists overdue tasks.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/tasks/overdue",
    responses(
        (status = 200, description = "Overdue tasks, earliest due date first", body = [TaskResponse]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_overdue_tasks_handler(
    State(state): State<Arc<TaskState>>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state.service().get_overdue_tasks().await?;
    Ok(Json(tasks))
}

/// Handler for GET /api/v1/tasks/statistics - Returns summary counts.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/tasks/statistics",
    responses(
        (status = 200, description = "Task counts", body = TaskStatistics),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_task_statistics_handler(
    State(state): State<Arc<TaskState>>,
) -> Result<Json<TaskStatistics>, ApiError> {
    let statistics = state.service().get_statistics().await?;
    Ok(Json(statistics))
}

/// Handler for GET /api/v1/tasks/{id} - Returns one task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = TaskResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn get_task_handler(
    State(state): State<Arc<TaskState>>,
    id: Result<Path<TaskId>, PathRejection>,
) -> Result<Json<TaskResponse>, ApiError> {
    let Path(id) = id?;
    let task = state.service().get_task(id).await?;
    Ok(Json(task))
}

/// Handler for PUT /api/v1/tasks/{id} - Replaces the editable fields of a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/api/v1/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    request_body = TaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Invalid task fields", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    id: Result<Path<TaskId>, PathRejection>,
    body: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, ApiError> {
    let Path(id) = id?;
    let Json(request) = body?;
    let task = state.service().update_task(id, request).await?;
    Ok(Json(task))
}

/// Handler for DELETE /api/v1/tasks/{id} - Deletes a task.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    id: Result<Path<TaskId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.service().delete_task(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PATCH /api/v1/tasks/{id}/toggle-completion - Flips pending and completed.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    patch,
    path = "/api/v1/tasks/{id}/toggle-completion",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task with its new status", body = TaskResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    tag = "Tasks"
)]
pub async fn toggle_task_completion_handler(
    State(state): State<Arc<TaskState>>,
    id: Result<Path<TaskId>, PathRejection>,
) -> Result<Json<TaskResponse>, ApiError> {
    let Path(id) = id?;
    let task = state.service().toggle_task_completion(id).await?;
    Ok(Json(task))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_task_handler,
        get_tasks_handler,
        get_overdue_tasks_handler,
        get_task_statistics_handler,
        get_task_handler,
        update_task_handler,
        delete_task_handler,
        toggle_task_completion_handler
    ),
    components(schemas(
        TaskRequest,
        TaskResponse,
        TaskPage,
        TaskStatistics,
        TaskStatus,
        TaskPriority,
        ErrorResponse
    )),
    tags((name = "Tasks", description = "Task management endpoints"))
)]
pub struct TasksApi;

/// Creates and returns the tasks API router.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", post(create_task_handler).get(get_tasks_handler))
        .route("/tasks/overdue", get(get_overdue_tasks_handler))
        .route("/tasks/statistics", get(get_task_statistics_handler))
        .route(
            "/tasks/{id}",
            get(get_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        )
        .route(
            "/tasks/{id}/toggle-completion",
            patch(toggle_task_completion_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error_context_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::task::store::MockTaskStore;
    use crate::task::{NewTask, Task};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use chrono::{DateTime, TimeZone, Utc};
    use insta::assert_yaml_snapshot;
    use mockall::predicate::eq;
    use tower::ServiceExt;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn app(store: MockTaskStore) -> Router {
        let state = TaskState::new(Arc::new(store), Arc::new(FixedClock::new(now())));
        create_api_router(Arc::new(state))
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn error_body(response: Response) -> ErrorResponse {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn can_create_task_with_created_status() {
        let mut store = MockTaskStore::new();
        store
            .expect_insert()
            .returning(|new_task: NewTask| Ok(Task::from_new(1, new_task)));

        let response = app(store)
            .oneshot(json_request(
                Method::POST,
                "/tasks",
                serde_json::json!({
                    "title": "Ship report",
                    "status": "PENDING",
                    "priority": "HIGH",
                    "dueDate": "2025-06-14"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let task: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(task["id"], 1);
        assert_eq!(task["status"], "PENDING");
        assert_eq!(task["priority"], "HIGH");
        assert_eq!(task["dueDate"], "2025-06-14");
        assert_eq!(task["overdue"], true);
        assert_eq!(task["completed"], false);
    }

    #[tokio::test]
    async fn can_report_validation_errors_per_field() {
        let response = app(MockTaskStore::new())
            .oneshot(json_request(
                Method::POST,
                "/tasks",
                serde_json::json!({ "title": "  ", "status": "PENDING", "priority": "LOW" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_yaml_snapshot!(error_body(response).await, @r#"
        timestamp: "2025-06-15T12:00:00Z"
        status: 400
        error: Validation Failed
        message: Invalid input parameters
        path: /tasks
        validationErrors:
          title: Task title is required
        "#);
    }

    #[tokio::test]
    async fn can_report_null_title_as_required() {
        let mut store = MockTaskStore::new();
        store.expect_insert().never();

        let response = app(store)
            .oneshot(json_request(
                Method::POST,
                "/tasks",
                serde_json::json!({ "title": null, "status": "PENDING", "priority": "LOW" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_yaml_snapshot!(error_body(response).await, @r#"
        timestamp: "2025-06-15T12:00:00Z"
        status: 400
        error: Validation Failed
        message: Invalid input parameters
        path: /tasks
        validationErrors:
          title: Task title is required
        "#);
    }

    #[tokio::test]
    async fn can_reject_unknown_priority_as_invalid_argument() {
        let response = app(MockTaskStore::new())
            .oneshot(json_request(
                Method::POST,
                "/tasks",
                serde_json::json!({ "title": "Ship report", "status": "PENDING", "priority": "URGENT" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_yaml_snapshot!(error_body(response).await, @r#"
        timestamp: "2025-06-15T12:00:00Z"
        status: 400
        error: Invalid Argument
        message: "Invalid task priority: URGENT"
        path: /tasks
        "#);
    }

    #[tokio::test]
    async fn can_handle_missing_task() {
        let mut store = MockTaskStore::new();
        store
            .expect_get_by_id()
            .with(eq(42))
            .returning(|_| Ok(None));

        let response = app(store)
            .oneshot(empty_request(Method::GET, "/tasks/42"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_yaml_snapshot!(error_body(response).await, @r#"
        timestamp: "2025-06-15T12:00:00Z"
        status: 404
        error: Task Not Found
        message: "Task not found with ID: 42"
        path: /tasks/42
        "#);
    }

    #[tokio::test]
    async fn can_hide_database_errors_behind_generic_message() {
        let mut store = MockTaskStore::new();
        store
            .expect_count_where()
            .returning(|_| Err(sea_orm::DbErr::Custom("password authentication failed".to_string())));

        let response = app(store)
            .oneshot(empty_request(Method::GET, "/tasks/statistics"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_yaml_snapshot!(error_body(response).await, @r#"
        timestamp: "2025-06-15T12:00:00Z"
        status: 500
        error: Internal Server Error
        message: An unexpected error occurred. Please try again later.
        path: /tasks/statistics
        "#);
    }

    #[tokio::test]
    async fn can_list_tasks_with_pagination_headers() {
        let mut store = MockTaskStore::new();
        store.expect_query().returning(|_| Ok((Vec::new(), 25)));

        let response = app(store)
            .oneshot(empty_request(Method::GET, "/tasks?page=2&size=10&sortBy=priority"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("X-Total-Count").unwrap(), "25");
        assert_eq!(headers.get("X-Page-Number").unwrap(), "2");
        assert_eq!(headers.get("X-Page-Size").unwrap(), "10");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let page: TaskPage = serde_json::from_slice(&body).unwrap();
        assert_eq!(page.total_elements, 25);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn can_reject_negative_page() {
        let response = app(MockTaskStore::new())
            .oneshot(empty_request(Method::GET, "/tasks?page=-1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = error_body(response).await;
        assert_eq!(body.error, "Invalid Argument");
        assert_eq!(body.message, "Page index must not be less than zero");
    }

    #[tokio::test]
    async fn can_reject_non_numeric_id() {
        let response = app(MockTaskStore::new())
            .oneshot(empty_request(Method::GET, "/tasks/abc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = error_body(response).await;
        assert_eq!(body.error, "Invalid Argument");
        assert_eq!(body.path.as_deref(), Some("/tasks/abc"));
        assert_eq!(body.timestamp, Some(now()));
    }

    #[tokio::test]
    async fn can_reject_malformed_json() {
        let response = app(MockTaskStore::new())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"title\":"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_body(response).await.error, "Invalid Argument");
    }

    #[tokio::test]
    async fn can_delete_task_with_no_content() {
        let mut store = MockTaskStore::new();
        store.expect_exists_by_id().with(eq(7)).returning(|_| Ok(true));
        store.expect_delete_by_id().with(eq(7)).returning(|_| Ok(true));

        let response = app(store)
            .oneshot(empty_request(Method::DELETE, "/tasks/7"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn error_path_includes_the_nesting_prefix() {
        let mut store = MockTaskStore::new();
        store.expect_get_by_id().returning(|_| Ok(None));
        let state = TaskState::new(Arc::new(store), Arc::new(FixedClock::new(now())));
        let app = Router::new().nest("/api/v1", create_api_router(Arc::new(state)));

        let response = app
            .oneshot(empty_request(Method::GET, "/api/v1/tasks/9"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_body(response).await.path.as_deref(), Some("/api/v1/tasks/9"));
    }

    #[tokio::test]
    async fn static_segments_are_not_treated_as_ids() {
        let mut store = MockTaskStore::new();
        store.expect_find_where().returning(|_| Ok(Vec::new()));
        store.expect_get_by_id().never();

        let response = app(store)
            .oneshot(empty_request(Method::GET, "/tasks/overdue"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
