use std::collections::HashMap;
use std::time::Duration;

use redis::streams::StreamId;
use redis::Value;

use icinga2_procmgr::stream::request::{ParseError, RejectReason, SpawnRequest};

fn message(fields: &[(&str, &str)]) -> StreamId {
    StreamId {
        id: "1690000000000-0".to_string(),
        map: fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::BulkString(v.as_bytes().to_vec())))
            .collect(),
    }
}

fn reject_reason(result: Result<SpawnRequest, ParseError>) -> (String, RejectReason) {
    match result {
        Err(ParseError::Rejected { request_id, reason }) => (request_id, reason),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn valid_message_parses() {
    let request = SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("command", r#"["/bin/echo","hi"]"#),
        ("env", r#"["K=V"]"#),
        ("timeout", "2.5"),
    ]))
    .unwrap();

    assert_eq!(request.request_id, "r1");
    assert_eq!(request.command, vec!["/bin/echo", "hi"]);
    assert_eq!(request.env, vec!["K=V"]);
    assert_eq!(request.timeout, Duration::from_secs_f64(2.5));
    assert_eq!(request.message_id, "1690000000000-0");
}

#[test]
fn missing_id_cannot_be_answered() {
    let result = SpawnRequest::parse(&message(&[
        ("command", r#"["/bin/true"]"#),
        ("env", "[]"),
        ("timeout", "1"),
    ]));

    assert!(matches!(result, Err(ParseError::MissingId)));
}

#[test]
fn wrong_kind_id_counts_as_missing() {
    let mut msg = message(&[("command", r#"["/bin/true"]"#), ("env", "[]"), ("timeout", "1")]);
    msg.map.insert("id".to_string(), Value::Int(7));

    assert!(matches!(
        SpawnRequest::parse(&msg),
        Err(ParseError::MissingId)
    ));
}

#[test]
fn command_must_be_json() {
    let (request_id, reason) = reject_reason(SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("command", "not-json"),
        ("env", "[]"),
        ("timeout", "1"),
    ])));

    assert_eq!(request_id, "r1");
    assert!(matches!(reason, RejectReason::BadCommandJson(_)));
    assert!(reason.to_string().starts_with("Bad command spec: "));
}

#[test]
fn command_must_not_be_empty() {
    let (_, reason) = reject_reason(SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("command", "[]"),
        ("env", "[]"),
        ("timeout", "1"),
    ])));

    assert!(matches!(reason, RejectReason::BadCommand));
    assert_eq!(reason.to_string(), "Bad command spec");
}

#[test]
fn command_field_is_required() {
    let (_, reason) = reject_reason(SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("env", "[]"),
        ("timeout", "1"),
    ])));

    assert!(matches!(reason, RejectReason::BadCommand));
}

#[test]
fn env_must_be_a_json_array() {
    let (_, reason) = reject_reason(SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("command", r#"["/bin/true"]"#),
        ("env", "{}"),
        ("timeout", "1"),
    ])));

    assert!(matches!(reason, RejectReason::BadEnvJson(_)));
    assert!(reason.to_string().starts_with("Bad env spec: "));
}

#[test]
fn env_field_is_required() {
    let (_, reason) = reject_reason(SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("command", r#"["/bin/true"]"#),
        ("timeout", "1"),
    ])));

    assert!(matches!(reason, RejectReason::BadEnv));
}

#[test]
fn timeout_must_parse_as_float() {
    let (_, reason) = reject_reason(SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("command", r#"["/bin/true"]"#),
        ("env", "[]"),
        ("timeout", "soon"),
    ])));

    assert!(matches!(reason, RejectReason::BadTimeoutFloat(_)));
    assert!(reason.to_string().starts_with("Bad timeout spec: "));
}

#[test]
fn negative_timeout_is_rejected() {
    let (_, reason) = reject_reason(SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("command", r#"["/bin/true"]"#),
        ("env", "[]"),
        ("timeout", "-1"),
    ])));

    assert!(matches!(reason, RejectReason::BadTimeoutRange(_)));
}

#[test]
fn non_finite_timeouts_are_rejected() {
    // All of these parse as floats but cannot bound a deadline.
    for raw in ["NaN", "inf", "-inf"] {
        let (_, reason) = reject_reason(SpawnRequest::parse(&message(&[
            ("id", "r1"),
            ("command", r#"["/bin/true"]"#),
            ("env", "[]"),
            ("timeout", raw),
        ])));

        assert!(
            matches!(reason, RejectReason::BadTimeoutRange(_)),
            "timeout {:?} must be rejected, got {:?}",
            raw,
            reason
        );
        assert!(reason.to_string().starts_with("Bad timeout spec: "));
    }
}

#[test]
fn fractional_timeout_is_permitted() {
    let request = SpawnRequest::parse(&message(&[
        ("id", "r1"),
        ("command", r#"["/bin/true"]"#),
        ("env", "[]"),
        ("timeout", "0.1"),
    ]))
    .unwrap();

    assert_eq!(request.timeout, Duration::from_millis(100));
}
