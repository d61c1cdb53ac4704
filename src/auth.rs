//! Auth — bearer-credential verification for websocket upgrades.
//!
//! DESIGN
//! ======
//! Accounts and login live outside this service. They hand clients an HS256
//! JWT signed with the shared `JWT_SECRET` whose `user-id` claim names the
//! participant. The upgrade route verifies it before accepting the socket and
//! hands the resulting `Participant` to the session.
//!
//! Browsers cannot attach headers to a websocket handshake, so the token is
//! looked up in order: `Authorization: Bearer`, `?token=`, `session_token`
//! cookie.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::{FromRef, FromRequestParts, Query};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::protocol::ErrorMessage;
use crate::state::AppState;

const COOKIE_NAME: &str = "session_token";
const TOKEN_QUERY_PARAM: &str = "token";
const USER_ID_CLAIM: &str = "user-id";

/// Default lifetime for tokens minted by `issue_token`.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(72 * 60 * 60);

// =============================================================================
// TYPES
// =============================================================================

/// Verified identity of the connecting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: String,
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "user-id")]
    user_id: String,
    exp: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing or invalid Authorization header")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid token claims")]
    MissingClaim,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorMessage { error: self.to_string() };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// Verify `token` and extract the participant identity.
///
/// # Errors
///
/// Returns `InvalidToken` for bad signatures, malformed tokens and expired
/// `exp` claims, and `MissingClaim` when `user-id` is absent or not a string.
pub fn verify_token(token: &str, secret: &str) -> Result<Participant, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Any HMAC variant signed with the shared secret is accepted.
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    // `exp` is checked when present but not demanded; `aud` is not checked.
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<serde_json::Value>(
        token.trim(),
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    let user_id = data
        .claims
        .get(USER_ID_CLAIM)
        .and_then(serde_json::Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(AuthError::MissingClaim)?;

    Ok(Participant { user_id: user_id.to_owned() })
}

/// Sign a token for `user_id` that expires after `ttl`.
///
/// # Errors
///
/// Returns `InvalidToken` if signing fails.
pub fn issue_token(user_id: &str, secret: &str, ttl: Duration) -> Result<String, AuthError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let claims = Claims { user_id: user_id.to_owned(), exp: (now + ttl).as_secs() };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Find the raw credential on an upgrade request.
fn find_token(parts: &Parts, query: &HashMap<String, String>) -> Option<String> {
    if let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) {
        let value = header.to_str().ok()?;
        let token = value.strip_prefix("Bearer ")?.trim();
        return (!token.is_empty()).then(|| token.to_owned());
    }

    if let Some(token) = query.get(TOKEN_QUERY_PARAM).filter(|t| !t.is_empty()) {
        return Some(token.clone());
    }

    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(COOKIE_NAME)
        .map(Cookie::value)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Verified participant extracted from the upgrade request.
/// Use as a handler parameter to require authentication.
pub struct AuthParticipant(pub Participant);

impl<S> FromRequestParts<S> for AuthParticipant
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();
        let token = find_token(parts, &query).ok_or(AuthError::MissingToken)?;

        let app_state = AppState::from_ref(state);
        let participant = verify_token(&token, &app_state.config.jwt_secret)
            .inspect_err(|e| warn!(error = %e, "auth: rejected upgrade credential"))?;

        Ok(Self(participant))
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
