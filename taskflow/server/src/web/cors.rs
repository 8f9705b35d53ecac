use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{Config, Profile};
use crate::task::api::v1::{PAGE_NUMBER_HEADER, PAGE_SIZE_HEADER, TOTAL_COUNT_HEADER};

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Builds the CORS layer for the active profile.
///
/// `dev` accepts any origin. `prod` accepts only the configured origins, where
/// an entry such as `https://*.vercel.app` matches any subdomain.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(Any)
        .expose_headers([TOTAL_COUNT_HEADER, PAGE_NUMBER_HEADER, PAGE_SIZE_HEADER]);

    match config.profile {
        Profile::Dev => layer.allow_origin(Any),
        Profile::Prod => {
            let patterns = config.cors_allowed_origins.clone();
            tracing::info!("Restricting CORS to origins: {:?}", patterns);
            layer.allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _request| {
                    origin
                        .to_str()
                        .is_ok_and(|origin| origin_allowed(&patterns, origin))
                },
            ))
        }
    }
}

/// Returns `true` when `origin` matches any of the patterns.
pub fn origin_allowed(patterns: &[String], origin: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| origin_matches(pattern.trim(), origin))
}

fn origin_matches(pattern: &str, origin: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.split_once("*.") {
        Some((scheme, domain)) => origin
            .strip_prefix(scheme)
            .and_then(|host| host.strip_suffix(domain))
            .and_then(|subdomain| subdomain.strip_suffix('.'))
            .is_some_and(|subdomain| !subdomain.is_empty() && !subdomain.contains('/')),
        None => pattern == origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn patterns() -> Vec<String> {
        vec![
            "https://taskflow.example.com".to_string(),
            "https://*.vercel.app".to_string(),
        ]
    }

    #[test]
    fn can_match_exact_origin() {
        assert!(origin_allowed(&patterns(), "https://taskflow.example.com"));
        assert!(!origin_allowed(&patterns(), "http://taskflow.example.com"));
        assert!(!origin_allowed(&patterns(), "https://evil.example.com"));
    }

    #[test]
    fn can_match_wildcard_subdomain() {
        assert!(origin_allowed(&patterns(), "https://taskflow-git-main.vercel.app"));
        assert!(origin_allowed(&patterns(), "https://a.b.vercel.app"));
        assert!(!origin_allowed(&patterns(), "https://vercel.app"));
        assert!(!origin_allowed(&patterns(), "https://evilvercel.app"));
        assert!(!origin_allowed(&patterns(), "http://preview.vercel.app"));
    }

    #[test]
    fn empty_list_allows_nothing() {
        assert!(!origin_allowed(&[], "https://taskflow.example.com"));
    }

    fn config(profile: &str) -> Config {
        Config::from_builder(
            ::config::Config::builder()
                .set_override("db_url", "postgres://unused")
                .unwrap()
                .set_override("profile", profile)
                .unwrap()
                .set_override("cors_allowed_origins", patterns())
                .unwrap(),
        )
        .unwrap()
    }

    async fn allow_origin_header(config: &Config, origin: &str) -> Option<HeaderValue> {
        let app = Router::new()
            .route("/test", axum::routing::get(|| async { "ok" }))
            .layer(cors_layer(config));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .header("origin", origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get("access-control-allow-origin")
            .cloned()
    }

    #[tokio::test]
    async fn dev_profile_allows_any_origin() {
        let header = allow_origin_header(&config("dev"), "http://localhost:5173").await;
        assert_eq!(header, Some(HeaderValue::from_static("*")));
    }

    #[tokio::test]
    async fn prod_profile_echoes_only_listed_origins() {
        let config = config("prod");

        let allowed = allow_origin_header(&config, "https://preview.vercel.app").await;
        assert_eq!(
            allowed,
            Some(HeaderValue::from_static("https://preview.vercel.app"))
        );

        let rejected = allow_origin_header(&config, "https://evil.example.com").await;
        assert_eq!(rejected, None);
    }
}
