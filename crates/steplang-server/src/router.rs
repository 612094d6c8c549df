//! Route table.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the application router with all API routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/run", post(handlers::run::submit_run))
        .route("/api/presets", get(handlers::presets::list_presets))
        .route(
            "/api/presets/{name}",
            get(handlers::presets::get_preset).put(handlers::presets::save_preset),
        )
        .route(
            "/api/session",
            get(handlers::session::get_session).put(handlers::session::save_session),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
