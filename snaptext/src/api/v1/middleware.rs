//! # V1 Rate-Limit Middleware
//!
//! Throttles extraction submissions per client identity using the shared
//! [`FixedWindowLimiter`](crate::ratelimit::FixedWindowLimiter). Applied
//! only to the submission route; reads and deletes are not throttled.
//!
//! Rejections conform to the v1 envelope and carry a `Retry-After` header.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::api::state::AppState;
use crate::error::SnapError;
use crate::ratelimit::client_identity;

use super::response::ApiResponse;

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = client_identity(request.headers());
    let decision = state.limiter.check(&identity);

    if !decision.allowed {
        let retry_after = decision.retry_after_secs(Utc::now());
        tracing::debug!(identity = %identity, retry_after, "Submission rejected by rate limiter");
        return ApiResponse::<()>::from(SnapError::RateLimited { retry_after }).into_response();
    }

    let mut response = next.run(request).await;
    if let Ok(value) = decision.remaining.to_string().parse() {
        response
            .headers_mut()
            .insert("x-ratelimit-remaining", value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::state::AppState;
    use crate::config::{
        Config, DatabaseConfig, ImageConfig, RateLimitConfig, ScoringConfig, ServerConfig,
        VisionConfig,
    };
    use crate::db::{Database, LibSqlStore};
    use crate::extraction::ExtractionService;
    use crate::ratelimit::FixedWindowLimiter;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{middleware, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: ":memory:".to_string(),
                auth_token: None,
            },
            vision: VisionConfig {
                model: "openai/gpt-4o".to_string(),
                api_key: Some("test-key".to_string()),
                base_url: Some("http://127.0.0.1:1".to_string()),
                timeout_secs: 1,
                max_output_tokens: 64,
                temperature: 0.1,
                max_attempts: 1,
                retry_base_delay_ms: 1,
            },
            image: ImageConfig::default(),
            rate_limit: RateLimitConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }

    async fn build_test_app(max_requests: u32) -> Router {
        let config = make_config();

        let database = Database::new(&config.database).await.unwrap();
        let store = Arc::new(LibSqlStore::new(database));
        let extraction = ExtractionService::from_config(&config).unwrap();
        let limiter = Arc::new(FixedWindowLimiter::new(max_requests, 60));
        let state = AppState::new(config, store, extraction, limiter);

        async fn submit_handler() -> &'static str {
            "accepted"
        }

        Router::new()
            .route("/extractions", post(submit_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
            .with_state(state)
    }

    fn submit() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/extractions")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_requests_within_budget_pass_through() {
        let app = build_test_app(2).await;

        for remaining in ["1", "0"] {
            let response = app.clone().oneshot(submit()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers().get("x-ratelimit-remaining").unwrap(),
                remaining
            );
        }
    }

    #[tokio::test]
    async fn test_saturated_window_returns_429_envelope() {
        let app = build_test_app(1).await;

        app.clone().oneshot(submit()).await.unwrap();
        let response = app.oneshot(submit()).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("Rate limit"));
    }

    #[tokio::test]
    async fn test_distinct_identities_have_separate_budgets() {
        let app = build_test_app(1).await;

        app.clone().oneshot(submit()).await.unwrap();

        let other = Request::builder()
            .method("POST")
            .uri("/extractions")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(other).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
