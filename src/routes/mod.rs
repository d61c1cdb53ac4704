//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Login and note storage are served elsewhere; this router only exposes the
//! collaboration upgrade endpoint plus health and room statistics.

pub mod rooms;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/notes/{id}", get(ws::handle_ws))
        .route("/api/rooms/stats", get(rooms::stats))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
