pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Report API
        .route("/api/v1/reports", post(handlers::handle_create_report))
        .route(
            "/api/v1/reports/:file_name",
            get(handlers::handle_download_report),
        )
        .with_state(state)
}
