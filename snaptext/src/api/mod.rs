mod state;
mod v1;

pub use state::AppState;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the application router with all middleware layers applied.
pub fn create_router(state: AppState) -> Router {
    // Slack on top of the upload ceiling covers multipart framing overhead;
    // oversized images still get the precise 413 from the handler.
    let body_limit = state.config.image.upload_max_bytes + 64 * 1024;

    Router::new()
        .nest("/api/v1", v1::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
