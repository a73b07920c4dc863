use driftsync_sync::{Event, EventRouter, Flow, Handler, SyncError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn recording(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str, flow: Flow) -> Handler {
    let log = log.clone();
    Arc::new(move |_event| {
        log.lock().unwrap().push(tag);
        Ok(flow)
    })
}

#[test]
fn handlers_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::new();
    router.register("ping", recording(&log, "first", Flow::Continue)).unwrap();
    router.register("ping", recording(&log, "second", Flow::Continue)).unwrap();
    router.register("ping", recording(&log, "third", Flow::Continue)).unwrap();

    assert!(router.trigger(Event::new("ping")));
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn stop_short_circuits_the_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::new();
    router.register("ping", recording(&log, "validator", Flow::Stop)).unwrap();
    router.register("ping", recording(&log, "body", Flow::Continue)).unwrap();

    router.trigger(Event::new("ping"));
    assert_eq!(*log.lock().unwrap(), vec!["validator"]);
}

#[test]
fn trigger_without_handlers_returns_false() {
    let mut router = EventRouter::new();
    assert!(!router.trigger(Event::new("unknown")));
}

#[test]
fn handler_error_aborts_chain_and_reports_via_continuation() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::new();
    router
        .register(
            "fs_event",
            Arc::new(|event: &mut Event| {
                event.params.val("path")?;
                Ok(Flow::Continue)
            }),
        )
        .unwrap();
    router.register("fs_event", recording(&log, "never", Flow::Continue)).unwrap();

    let errors_clone = errors.clone();
    let event = Event::new("fs_event").with_error(Box::new(move |e| {
        errors_clone.lock().unwrap().push(e.to_string());
    }));
    router.trigger(event);

    assert!(log.lock().unwrap().is_empty());
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("path"));
}

#[test]
fn queued_router_defers_until_commit_in_fifo_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::queued();
    router.register("a", recording(&log, "a", Flow::Continue)).unwrap();
    router.register("b", recording(&log, "b", Flow::Continue)).unwrap();

    assert!(router.trigger(Event::new("a")));
    assert!(router.trigger(Event::new("b")));
    assert!(router.trigger(Event::new("a")));
    assert!(log.lock().unwrap().is_empty());

    router.commit();
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "a"]);

    // Queue is drained; a second commit runs nothing
    router.commit();
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn temp_registration_fires_exactly_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::new();
    let token = router.temp(
        recording(&log, "reply", Flow::Continue),
        Duration::from_secs(30),
    );
    assert_eq!(router.route_len(&token), 1);

    assert!(router.trigger(Event::new(token.clone())));
    assert_eq!(*log.lock().unwrap(), vec!["reply"]);
    assert_eq!(router.route_len(&token), 0);

    // Consumed: a duplicate reply finds no handler
    assert!(!router.trigger(Event::new(token)));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn temp_tokens_are_distinct() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::new();
    let t1 = router.temp(recording(&log, "one", Flow::Continue), Duration::from_secs(30));
    let t2 = router.temp(recording(&log, "two", Flow::Continue), Duration::from_secs(30));
    assert_ne!(t1, t2);

    router.trigger(Event::new(t2));
    assert_eq!(*log.lock().unwrap(), vec!["two"]);
    assert_eq!(router.route_len(&t1), 1);
}

#[test]
fn expired_temp_registration_never_fires() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::new();
    let token = router.temp(recording(&log, "late", Flow::Continue), Duration::ZERO);

    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(router.route_len(&token), 0);
    assert!(!router.trigger(Event::new(token)));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn sweep_expired_reclaims_stale_registrations() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::new();
    router.temp(recording(&log, "stale", Flow::Continue), Duration::ZERO);
    let live = router.temp(recording(&log, "live", Flow::Continue), Duration::from_secs(30));

    std::thread::sleep(Duration::from_millis(5));
    router.sweep_expired();
    assert_eq!(router.route_len(&live), 1);
}

#[test]
fn gating_requires_a_configured_strategy() {
    let mut router = EventRouter::new();
    router.auth_strategy_on();
    let err = router
        .register("fs_event", Arc::new(|_| Ok(Flow::Continue)))
        .unwrap_err();
    assert!(matches!(err, SyncError::AuthConfig(_)));
}

#[test]
fn gated_handler_rejects_while_unauthenticated() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let authed = Arc::new(Mutex::new(false));

    let mut router = EventRouter::new();
    let authed_clone = authed.clone();
    router.set_auth_strategy(Arc::new(move || *authed_clone.lock().unwrap()));
    router.auth_strategy_on();
    router.register("fs_event", recording(&log, "body", Flow::Continue)).unwrap();
    router.auth_strategy_off();

    let errors_clone = errors.clone();
    router.trigger(Event::new("fs_event").with_error(Box::new(move |e| {
        errors_clone.lock().unwrap().push(e);
    })));
    assert!(log.lock().unwrap().is_empty());
    assert!(matches!(errors.lock().unwrap()[0], SyncError::AuthRequired));

    // Strategy is consulted at dispatch time, not registration time
    *authed.lock().unwrap() = true;
    router.trigger(Event::new("fs_event"));
    assert_eq!(*log.lock().unwrap(), vec!["body"]);
}

#[test]
fn gating_wraps_future_registrations_only() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = EventRouter::new();
    router.set_auth_strategy(Arc::new(|| false));
    router.register("ping", recording(&log, "open", Flow::Continue)).unwrap();
    router.auth_strategy_on();
    router.register("fs_event", recording(&log, "gated", Flow::Continue)).unwrap();
    router.auth_strategy_off();
    router.register("pong", recording(&log, "open-again", Flow::Continue)).unwrap();

    router.trigger(Event::new("ping"));
    router.trigger(Event::new("fs_event"));
    router.trigger(Event::new("pong"));
    assert_eq!(*log.lock().unwrap(), vec!["open", "open-again"]);
}
