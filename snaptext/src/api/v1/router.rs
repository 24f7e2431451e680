use axum::routing::get;
use axum::{middleware, routing::post, Router};

use crate::api::state::AppState;

use super::handlers;
use super::middleware::rate_limit_middleware;

pub fn v1_router(state: AppState) -> Router<AppState> {
    // Only submissions consume the rate budget; reads and deletes pass
    // through untouched.
    let submissions = Router::new()
        .route("/extractions", post(handlers::extractions::create_extraction))
        .route_layer(middleware::from_fn_with_state(
            state,
            rate_limit_middleware,
        ));

    let records = Router::new()
        .route("/extractions", get(handlers::extractions::list_extractions))
        .route("/extractions/stats", get(handlers::extractions::get_stats))
        .route(
            "/extractions/{id}",
            get(handlers::extractions::get_extraction)
                .delete(handlers::extractions::delete_extraction),
        );

    let public = Router::new().route("/health", get(handlers::health::health_check));

    Router::new()
        .merge(public)
        .merge(submissions)
        .merge(records)
}
