//! Collaboration session — one participant's lifetime in one note room.
//!
//! LIFECYCLE
//! =========
//! `Unauthenticated → Joining → Active → Leaving → Closed`
//!
//! 1. Without a document id or a verified participant, send an error
//!    message and close. The registry is never touched.
//! 2. Join the room, then announce `presence:join` to the other members
//!    before reading anything from this client.
//! 3. Receive loop: parse, validate, stamp `user-id`, broadcast to everyone
//!    but this connection. Bad payloads are dropped; the loop continues.
//! 4. When the receive loop ends for any reason: leave, announce
//!    `presence:leave`, close.
//!
//! Peer send failures are absorbed by the registry, so nothing another
//! member does can end this session.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::Participant;
use crate::conn::{Connection, Envelope, MessageKind};
use crate::protocol::{self, ErrorMessage, MessageError, MessagePolicy, PresenceAction, PresenceMessage};
use crate::rooms::RoomRegistry;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Joining,
    Active,
    Leaving,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Missing note ID")]
    MissingDocument,
    #[error("User ID not found in context")]
    Unauthorized,
}

/// Per-session counters, logged when the session closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Inbound messages that passed validation and were broadcast.
    pub relayed: usize,
    /// Inbound messages dropped by validation.
    pub dropped: usize,
    /// Whether this session's departure removed the room.
    pub room_deleted: bool,
}

struct Session<'a> {
    registry: &'a RoomRegistry,
    conn: Arc<dyn Connection>,
    document_id: &'a str,
    participant: &'a Participant,
    policy: MessagePolicy,
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Drive one connection from admission to close.
///
/// # Errors
///
/// Returns `MissingDocument` or `Unauthorized` when the session is refused
/// before joining. Everything after admission is absorbed and logged.
pub async fn run_session(
    registry: &RoomRegistry,
    conn: Arc<dyn Connection>,
    document_id: &str,
    participant: Option<&Participant>,
    policy: MessagePolicy,
) -> Result<SessionSummary, SessionError> {
    let conn_id = conn.id();
    debug!(%conn_id, phase = ?SessionPhase::Unauthenticated, "session: admitting");

    if document_id.is_empty() {
        return Err(refuse(conn.as_ref(), SessionError::MissingDocument).await);
    }
    let Some(participant) = participant else {
        return Err(refuse(conn.as_ref(), SessionError::Unauthorized).await);
    };

    let session = Session { registry, conn, document_id, participant, policy };
    let mut summary = SessionSummary::default();

    session.join().await;

    loop {
        let envelope = match session.conn.recv().await {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(%conn_id, %document_id, reason = %e, "session: receive loop ended");
                break;
            }
        };

        match session.relay(envelope).await {
            Ok(delivered) => {
                summary.relayed += 1;
                debug!(%conn_id, %document_id, delivered, "session: relayed message");
            }
            Err(e) => {
                summary.dropped += 1;
                warn!(%conn_id, %document_id, user_id = %participant, error = %e, "session: dropped message");
            }
        }
    }

    summary.room_deleted = session.leave().await;
    info!(
        %conn_id,
        %document_id,
        user_id = %participant,
        relayed = summary.relayed,
        dropped = summary.dropped,
        room_deleted = summary.room_deleted,
        phase = ?SessionPhase::Closed,
        "session: closed"
    );
    Ok(summary)
}

/// Report a pre-join failure to the client and close without joining.
async fn refuse(conn: &dyn Connection, err: SessionError) -> SessionError {
    warn!(conn_id = %conn.id(), error = %err, "session: refused");
    match encode(MessageKind::Text, &ErrorMessage { error: err.to_string() }) {
        Ok(envelope) => {
            if let Err(e) = conn.send(envelope).await {
                debug!(conn_id = %conn.id(), error = %e, "session: could not deliver refusal");
            }
        }
        Err(e) => warn!(error = %e, "session: failed to encode refusal"),
    }
    if let Err(e) = conn.close().await {
        debug!(conn_id = %conn.id(), error = %e, "session: close after refusal failed");
    }
    err
}

// =============================================================================
// PHASES
// =============================================================================

impl Session<'_> {
    async fn join(&self) {
        debug!(conn_id = %self.conn.id(), phase = ?SessionPhase::Joining, "session: joining");
        self.registry.join(self.document_id, self.conn.clone()).await;
        self.announce(PresenceAction::Join).await;
        let members = self.registry.member_count(self.document_id).await;
        info!(
            conn_id = %self.conn.id(),
            document_id = %self.document_id,
            user_id = %self.participant,
            members,
            phase = ?SessionPhase::Active,
            "session: user joined note room"
        );
    }

    /// Validate one inbound message and broadcast its stamped form.
    /// Returns the number of peers that accepted it.
    async fn relay(&self, envelope: Envelope) -> Result<usize, MessageError> {
        let inbound = protocol::parse_inbound(&envelope.payload, self.policy)?;
        let outbound = inbound.stamp(&self.participant.user_id);
        let envelope = encode(envelope.kind, &outbound)?;
        Ok(self.registry.broadcast(self.document_id, self.conn.id(), &envelope).await)
    }

    /// Leave the room, tell the others, close the channel. Returns whether
    /// the room was removed.
    async fn leave(&self) -> bool {
        debug!(conn_id = %self.conn.id(), phase = ?SessionPhase::Leaving, "session: leaving");
        let room_deleted = self.registry.leave(self.document_id, self.conn.id()).await;
        self.announce(PresenceAction::Leave).await;
        if let Err(e) = self.conn.close().await {
            debug!(conn_id = %self.conn.id(), error = %e, "session: close failed");
        }
        info!(document_id = %self.document_id, user_id = %self.participant, "session: user left note room");
        room_deleted
    }

    async fn announce(&self, action: PresenceAction) {
        let presence = PresenceMessage::new(action, &self.participant.user_id);
        match encode(MessageKind::Text, &presence) {
            Ok(envelope) => {
                let delivered = self.registry.broadcast(self.document_id, self.conn.id(), &envelope).await;
                debug!(document_id = %self.document_id, %action, delivered, "session: presence announced");
            }
            Err(e) => warn!(error = %e, %action, "session: failed to encode presence"),
        }
    }
}

fn encode<T: Serialize>(kind: MessageKind, value: &T) -> Result<Envelope, serde_json::Error> {
    let payload = serde_json::to_vec(value)?;
    Ok(Envelope { kind, payload: payload.into() })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
