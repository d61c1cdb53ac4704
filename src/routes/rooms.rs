//! Room statistics route.

use axum::Json;
use axum::extract::State;

use crate::rooms::RegistryStats;
use crate::state::AppState;

/// `GET /api/rooms/stats` — live room and connection counts.
pub async fn stats(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(state.registry.stats().await)
}
