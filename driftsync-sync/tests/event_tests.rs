use driftsync_sync::{Event, Params, Status, SyncError};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn bag(value: serde_json::Value) -> Params {
    Params::from_value(value).unwrap()
}

// ── Params ───────────────────────────────────────────────────────

#[test]
fn from_value_rejects_non_map() {
    let err = Params::from_value(json!([1, 2, 3])).unwrap_err();
    assert!(matches!(err, SyncError::BadParams(_)));
}

#[test]
fn from_value_accepts_null_as_empty() {
    let params = bag(json!(null));
    assert_eq!(params.to_value(), json!({}));
}

#[test]
fn val_returns_present_key() {
    let params = bag(json!({"guid": "abc"}));
    assert_eq!(params.val("guid").unwrap(), &json!("abc"));
}

#[test]
fn val_missing_key_fails() {
    let params = bag(json!({"guid": "abc"}));
    let err = params.val("rand").unwrap_err();
    assert!(matches!(err, SyncError::MissingKey { key } if key == "rand"));
}

#[test]
fn vals_with_no_declared_keys_returns_full_bag() {
    let params = bag(json!({"a": 1, "b": 2}));
    let all = params.vals().unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn vals_projects_required_and_allowed() {
    let mut params = bag(json!({"a": 1, "b": 2, "c": 3}));
    params.require(["a"]).allow(["b", "d"]);
    let view = params.vals().unwrap();
    assert_eq!(view.get("a"), Some(&json!(1)));
    assert_eq!(view.get("b"), Some(&json!(2)));
    // "c" was neither required nor allowed; "d" is allowed but absent
    assert!(!view.contains_key("c"));
    assert!(!view.contains_key("d"));
}

#[test]
fn vals_missing_required_key_fails() {
    let mut params = bag(json!({"b": 2}));
    params.require(["a"]);
    assert!(matches!(
        params.vals().unwrap_err(),
        SyncError::MissingKey { key } if key == "a"
    ));
}

#[test]
fn require_is_idempotent_union() {
    let mut params = bag(json!({"a": 1, "b": 2}));
    params.require(["a"]).require(["a", "b"]);
    assert_eq!(params.vals().unwrap().len(), 2);
}

#[test]
fn get_wraps_nested_map() {
    let params = bag(json!({"inner": {"x": 10}}));
    let inner = params.get("inner").unwrap();
    assert_eq!(inner.val("x").unwrap(), &json!(10));
}

#[test]
fn get_missing_key_fails() {
    let params = bag(json!({}));
    assert!(matches!(
        params.get("inner").unwrap_err(),
        SyncError::MissingKey { .. }
    ));
}

#[test]
fn get_non_map_value_fails() {
    let params = bag(json!({"inner": 42}));
    assert!(matches!(
        params.get("inner").unwrap_err(),
        SyncError::BadParams(_)
    ));
}

// ── Status ───────────────────────────────────────────────────────

#[test]
fn status_serde_wire_form() {
    assert_eq!(serde_json::to_string(&Status::Ok).unwrap(), "\"ok\"");
    assert_eq!(serde_json::to_string(&Status::Error).unwrap(), "\"error\"");
    let other: Status = serde_json::from_str("\"partial\"").unwrap();
    assert_eq!(other, Status::Other("partial".to_string()));
    let ok: Status = serde_json::from_str("\"ok\"").unwrap();
    assert_eq!(ok, Status::Ok);
}

// ── Event ────────────────────────────────────────────────────────

#[test]
fn reply_invokes_continuation_with_rcode_name() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let mut event = Event::new("store")
        .with_rcode("rcode-123")
        .with_reply(Box::new(move |reply| {
            seen_clone
                .lock()
                .unwrap()
                .push((reply.name.clone(), reply.status.clone()));
        }));

    event.reply(Status::Ok, Params::new());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], ("rcode-123".to_string(), Status::Ok));
}

#[test]
fn reply_without_continuation_is_non_fatal() {
    let mut event = Event::new("store");
    // Warns, does not panic or error
    event.reply(Status::Ok, Params::new());
}

#[test]
fn reply_continuation_fires_at_most_once() {
    let count = Arc::new(Mutex::new(0));
    let count_clone = count.clone();
    let mut event = Event::new("store")
        .with_rcode("r")
        .with_reply(Box::new(move |_| *count_clone.lock().unwrap() += 1));

    event.reply(Status::Ok, Params::new());
    event.reply(Status::Ok, Params::new());
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn event_defaults() {
    let event = Event::new("ping");
    assert_eq!(event.status, Status::Ok);
    assert_eq!(event.rcode, "");
    assert!(event.source.is_none());
    assert!(!event.can_reply());
}
