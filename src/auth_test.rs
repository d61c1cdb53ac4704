use super::*;
use axum::http::Request;

const SECRET: &str = "test-secret";

fn parts_for(builder: axum::http::request::Builder) -> Parts {
    builder.body(()).expect("request should build").into_parts().0
}

fn sign(claims: &serde_json::Value, secret: &str) -> String {
    sign_with(Algorithm::HS256, claims, secret)
}

fn sign_with(algorithm: Algorithm, claims: &serde_json::Value, secret: &str) -> String {
    jsonwebtoken::encode(&Header::new(algorithm), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("test token should sign")
}

// =============================================================================
// verify_token
// =============================================================================

#[test]
fn issued_token_round_trips() {
    let token = issue_token("u1", SECRET, DEFAULT_TOKEN_TTL).unwrap();
    let participant = verify_token(&token, SECRET).unwrap();
    assert_eq!(participant, Participant { user_id: "u1".into() });
    assert_eq!(participant.to_string(), "u1");
}

#[test]
fn wrong_secret_is_rejected() {
    let token = issue_token("u1", SECRET, DEFAULT_TOKEN_TTL).unwrap();
    assert!(matches!(verify_token(&token, "other-secret"), Err(AuthError::InvalidToken(_))));
}

#[test]
fn garbage_token_is_rejected() {
    assert!(matches!(verify_token("not.a.jwt", SECRET), Err(AuthError::InvalidToken(_))));
}

#[test]
fn expired_token_is_rejected() {
    let token = sign(&serde_json::json!({"user-id": "u1", "exp": 1_000}), SECRET);
    assert!(matches!(verify_token(&token, SECRET), Err(AuthError::InvalidToken(_))));
}

#[test]
fn token_without_exp_is_accepted() {
    let token = sign(&serde_json::json!({"user-id": "u1"}), SECRET);
    assert_eq!(verify_token(&token, SECRET).unwrap().user_id, "u1");
}

#[test]
fn audience_claim_is_ignored() {
    let token = sign(&serde_json::json!({"user-id": "u1", "aud": "collab-notes"}), SECRET);
    assert_eq!(verify_token(&token, SECRET).unwrap().user_id, "u1");
}

#[test]
fn every_hmac_algorithm_is_accepted() {
    for algorithm in [Algorithm::HS384, Algorithm::HS512] {
        let token = sign_with(algorithm, &serde_json::json!({"user-id": "u1"}), SECRET);
        let participant = verify_token(&token, SECRET).unwrap_or_else(|e| panic!("{algorithm:?} rejected: {e}"));
        assert_eq!(participant.user_id, "u1");
    }
}

#[test]
fn missing_user_id_claim_is_rejected() {
    let token = sign(&serde_json::json!({"sub": "u1"}), SECRET);
    assert!(matches!(verify_token(&token, SECRET), Err(AuthError::MissingClaim)));
}

#[test]
fn non_string_user_id_claim_is_rejected() {
    let token = sign(&serde_json::json!({"user-id": 7}), SECRET);
    assert!(matches!(verify_token(&token, SECRET), Err(AuthError::MissingClaim)));
}

// =============================================================================
// find_token
// =============================================================================

#[test]
fn bearer_header_is_preferred() {
    let parts = parts_for(Request::builder().uri("/ws/notes/n1").header("Authorization", "Bearer  abc "));
    let mut query = HashMap::new();
    query.insert("token".to_owned(), "from-query".to_owned());
    assert_eq!(find_token(&parts, &query).as_deref(), Some("abc"));
}

#[test]
fn non_bearer_header_yields_nothing() {
    let parts = parts_for(Request::builder().uri("/ws/notes/n1").header("Authorization", "Basic abc"));
    assert_eq!(find_token(&parts, &HashMap::new()), None);
}

#[test]
fn bearer_without_separator_yields_nothing() {
    let parts = parts_for(Request::builder().uri("/ws/notes/n1").header("Authorization", "Bearerabc"));
    assert_eq!(find_token(&parts, &HashMap::new()), None);
}

#[test]
fn query_token_used_without_header() {
    let parts = parts_for(Request::builder().uri("/ws/notes/n1?token=q"));
    let mut query = HashMap::new();
    query.insert("token".to_owned(), "q".to_owned());
    assert_eq!(find_token(&parts, &query).as_deref(), Some("q"));
}

#[test]
fn cookie_token_is_last_resort() {
    let parts = parts_for(Request::builder().uri("/ws/notes/n1").header("Cookie", "session_token=c; other=1"));
    assert_eq!(find_token(&parts, &HashMap::new()).as_deref(), Some("c"));
}

#[test]
fn no_credential_yields_nothing() {
    let parts = parts_for(Request::builder().uri("/ws/notes/n1"));
    assert_eq!(find_token(&parts, &HashMap::new()), None);
}

// =============================================================================
// extractor
// =============================================================================

#[tokio::test]
async fn extractor_accepts_valid_query_token() {
    let state = crate::state::test_helpers::test_app_state();
    let token = issue_token("u1", &state.config.jwt_secret, DEFAULT_TOKEN_TTL).unwrap();
    let mut parts = parts_for(Request::builder().uri(format!("/ws/notes/n1?token={token}")));

    let AuthParticipant(participant) = AuthParticipant::from_request_parts(&mut parts, &state)
        .await
        .expect("valid token should authenticate");
    assert_eq!(participant.user_id, "u1");
}

#[tokio::test]
async fn extractor_rejects_missing_token_with_401() {
    let state = crate::state::test_helpers::test_app_state();
    let mut parts = parts_for(Request::builder().uri("/ws/notes/n1"));

    let Err(rejection) = AuthParticipant::from_request_parts(&mut parts, &state).await else {
        panic!("missing token should be rejected");
    };
    assert!(matches!(rejection, AuthError::MissingToken));
    assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
}
