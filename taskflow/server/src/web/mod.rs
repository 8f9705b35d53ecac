use axum::Router;
use axum::routing::get;
use migration::MigratorTrait;
use sea_orm::Database;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::clock::SystemClock;
use crate::config::{self, Config};
use crate::task::{SeaOrmTaskStore, TaskState};

pub mod api;
pub mod cors;

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: config::Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(config.connect_options()).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let store = SeaOrmTaskStore::new(Arc::new(db));
    let task_state = Arc::new(TaskState::new(Arc::new(store), Arc::new(SystemClock)));

    let app = create_app(task_state, &config);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Assembles the full application: health check, JSON API, API docs and the
/// tracing and CORS layers.
pub fn create_app(task_state: Arc<TaskState>, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .merge(api::create_api_router(task_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api::get_docs()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors::cors_layer(config)),
        )
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::task::store::MockTaskStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = Config::from_builder(
            ::config::Config::builder().set_override("db_url", "postgres://unused").unwrap(),
        )
        .unwrap();
        let state = TaskState::new(
            Arc::new(MockTaskStore::new()),
            Arc::new(FixedClock::new(Utc::now())),
        );
        create_app(Arc::new(state), &config)
    }

    #[tokio::test]
    async fn can_answer_health_check() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn can_serve_openapi_document() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let document: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(document["paths"]["/api/v1/tasks"].is_object());
        assert!(document["paths"]["/api/v1/tasks/{id}/toggle-completion"].is_object());
    }

    #[tokio::test]
    async fn api_routes_are_nested_under_version_prefix() {
        let response = test_app()
            .oneshot(Request::builder().uri("/tasks/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
