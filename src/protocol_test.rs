use super::*;
use serde_json::json;

// =============================================================================
// parse_inbound
// =============================================================================

#[test]
fn accepts_whitelisted_types() {
    for kind in ["edit", "typing", "cursor"] {
        let raw = json!({"type": kind, "content": "x"}).to_string();
        let msg = parse_inbound(raw.as_bytes(), MessagePolicy::Strict).expect("whitelisted type should parse");
        assert_eq!(msg.kind, kind);
        assert_eq!(msg.content, "x");
    }
}

#[test]
fn strict_whitelist_rejects_near_misses() {
    assert_eq!(ALLOWED_TYPES, ["edit", "typing", "cursor"]);
    for kind in ["Edit", "presence", "edits", " edit"] {
        let raw = json!({"type": kind, "content": "x"}).to_string();
        let err = parse_inbound(raw.as_bytes(), MessagePolicy::Strict).unwrap_err();
        assert!(matches!(err, MessageError::UnknownType(_)), "{kind:?} should be rejected");
    }
}

#[test]
fn rejects_non_json() {
    let err = parse_inbound(b"not json at all", MessagePolicy::Strict).unwrap_err();
    assert!(matches!(err, MessageError::InvalidJson(_)));
}

#[test]
fn rejects_non_string_content() {
    let err = parse_inbound(br#"{"type":"edit","content":42}"#, MessagePolicy::Strict).unwrap_err();
    assert!(matches!(err, MessageError::InvalidJson(_)));
}

#[test]
fn rejects_empty_type() {
    let err = parse_inbound(br#"{"type":"","content":"x"}"#, MessagePolicy::Strict).unwrap_err();
    assert!(matches!(err, MessageError::MissingTypeOrContent));
}

#[test]
fn rejects_missing_content() {
    let err = parse_inbound(br#"{"type":"edit"}"#, MessagePolicy::Lenient).unwrap_err();
    assert!(matches!(err, MessageError::MissingTypeOrContent));
}

#[test]
fn strict_policy_rejects_unknown_type() {
    let err = parse_inbound(br#"{"type":"bogus","content":"x"}"#, MessagePolicy::Strict).unwrap_err();
    match err {
        MessageError::UnknownType(kind) => assert_eq!(kind, "bogus"),
        other => panic!("expected UnknownType, got {other:?}"),
    }
}

#[test]
fn lenient_policy_accepts_unknown_type() {
    let msg = parse_inbound(br#"{"type":"bogus","content":"x"}"#, MessagePolicy::Lenient).unwrap();
    assert_eq!(msg.kind, "bogus");
}

#[test]
fn extra_fields_are_ignored() {
    let msg = parse_inbound(br#"{"type":"edit","content":"x","user-id":"spoofed"}"#, MessagePolicy::Strict).unwrap();
    assert_eq!(msg.stamp("real").user_id, "real");
}

// =============================================================================
// wire shapes
// =============================================================================

#[test]
fn outbound_wire_shape() {
    let msg = InboundMessage { kind: "edit".into(), content: "hello".into() }.stamp("u1");
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value, json!({"type": "edit", "content": "hello", "user-id": "u1"}));
}

#[test]
fn presence_wire_shape() {
    let join = serde_json::to_value(PresenceMessage::new(PresenceAction::Join, "u1")).unwrap();
    let leave = serde_json::to_value(PresenceMessage::new(PresenceAction::Leave, "u1")).unwrap();
    assert_eq!(join, json!({"type": "presence", "action": "join", "user-id": "u1"}));
    assert_eq!(leave, json!({"type": "presence", "action": "leave", "user-id": "u1"}));
}

// =============================================================================
// MessagePolicy
// =============================================================================

#[test]
fn policy_parses_case_insensitively() {
    assert_eq!("strict".parse::<MessagePolicy>(), Ok(MessagePolicy::Strict));
    assert_eq!(" Lenient ".parse::<MessagePolicy>(), Ok(MessagePolicy::Lenient));
    assert!("loose".parse::<MessagePolicy>().is_err());
    assert_eq!(MessagePolicy::default(), MessagePolicy::Strict);
}
