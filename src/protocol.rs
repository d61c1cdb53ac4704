//! Protocol — wire payloads exchanged inside a note room.
//!
//! DESIGN
//! ======
//! Clients send `{"type", "content"}`. The server never interprets `content`;
//! it validates the envelope, stamps the sender's `user-id` and relays it.
//! Presence events are generated server-side on join and leave.
//!
//! Which `type` values are accepted is a `MessagePolicy`: `Strict` enforces
//! the `edit`/`typing`/`cursor` whitelist, `Lenient` accepts any non-empty
//! type for clients built against the looser protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// CONSTANTS
// =============================================================================

pub const PRESENCE_TYPE: &str = "presence";

/// Collaboration message types accepted under `MessagePolicy::Strict`.
pub const ALLOWED_TYPES: [&str; 3] = ["edit", "typing", "cursor"];

// =============================================================================
// MESSAGE TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    Join,
    Leave,
}

impl fmt::Display for PresenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join => f.write_str("join"),
            Self::Leave => f.write_str("leave"),
        }
    }
}

/// Message-type validation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessagePolicy {
    /// Only `edit`, `typing` and `cursor` are relayed.
    #[default]
    Strict,
    /// Any non-empty type is relayed.
    Lenient,
}

impl FromStr for MessagePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown message policy '{other}' (expected 'strict' or 'lenient')")),
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Client → server collaboration message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

impl InboundMessage {
    /// Attach the verified sender identity for rebroadcast.
    #[must_use]
    pub fn stamp(self, user_id: &str) -> OutboundMessage {
        OutboundMessage { kind: self.kind, content: self.content, user_id: user_id.to_owned() }
    }
}

/// Server → peers rebroadcast of a validated message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(rename = "user-id")]
    pub user_id: String,
}

/// Join/leave announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: PresenceAction,
    #[serde(rename = "user-id")]
    pub user_id: String,
}

impl PresenceMessage {
    #[must_use]
    pub fn new(action: PresenceAction, user_id: &str) -> Self {
        Self { kind: PRESENCE_TYPE.to_owned(), action, user_id: user_id.to_owned() }
    }
}

/// Sent to a client that is turned away before joining a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

// =============================================================================
// VALIDATION
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("invalid message json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing type or content")]
    MissingTypeOrContent,
    #[error("invalid message type: {0}")]
    UnknownType(String),
}

/// Parse and validate one inbound payload.
///
/// # Errors
///
/// Returns `InvalidJson` for unparseable input, `MissingTypeOrContent` when
/// either field is empty, and `UnknownType` when `policy` is strict and the
/// type is outside the whitelist.
pub fn parse_inbound(payload: &[u8], policy: MessagePolicy) -> Result<InboundMessage, MessageError> {
    let msg: InboundMessage = serde_json::from_slice(payload)?;

    if msg.kind.is_empty() || msg.content.is_empty() {
        return Err(MessageError::MissingTypeOrContent);
    }

    if policy == MessagePolicy::Strict && !ALLOWED_TYPES.contains(&msg.kind.as_str()) {
        return Err(MessageError::UnknownType(msg.kind));
    }

    Ok(msg)
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
