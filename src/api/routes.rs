use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// Routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Weather
        .route("/weather/today", get(handlers::weather_today))
        .route("/weather/weekly", get(handlers::weather_weekly))
        .route("/admin/weather/weekly/refresh", post(handlers::refresh_weekly))
        // Recommendations
        .route("/recommend/materials", post(handlers::recommend_materials))
        .route("/recommend/today", get(handlers::recommend_today))
        // Comfort scoring
        .route("/comfort/batch", post(handlers::comfort_batch))
}
