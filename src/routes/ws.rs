//! WebSocket handler — note collaboration upgrade.
//!
//! DESIGN
//! ======
//! Authorization happens before the upgrade: the `AuthParticipant`
//! extractor answers 401 for a missing or unverifiable token, so no socket is
//! ever opened for an anonymous client. After the upgrade, the task axum
//! spawns for the socket drives the session until the client disconnects.
//!
//! LIFECYCLE
//! =========
//! 1. `GET /ws/notes/{id}` with a bearer token → 101 Switching Protocols
//! 2. Socket wrapped in `WsConnection` (writer task + bounded outbound queue)
//! 3. `session::run_session` joins the room and relays until close

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use tracing::{info, warn};

use crate::auth::{AuthParticipant, Participant};
use crate::conn::{Connection, WsConnection};
use crate::session;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    AuthParticipant(participant): AuthParticipant,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, document_id, participant))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(socket: WebSocket, state: AppState, document_id: String, participant: Participant) {
    let conn: Arc<dyn Connection> = Arc::new(WsConnection::new(socket, state.config.ws_outbound_buffer));
    let conn_id = conn.id();
    info!(%conn_id, %document_id, user_id = %participant, "ws: client connected");

    let outcome = session::run_session(
        &state.registry,
        conn,
        &document_id,
        Some(&participant),
        state.config.message_policy,
    )
    .await;

    match outcome {
        Ok(summary) => info!(%conn_id, relayed = summary.relayed, dropped = summary.dropped, "ws: client disconnected"),
        Err(e) => warn!(%conn_id, error = %e, "ws: session refused"),
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
