use async_trait::async_trait;
use driftsync_sync::{LevelHooks, RunLevel, StateMachine, SyncError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const POLL: Duration = Duration::from_millis(5);

/// Hooks with counted lifecycle calls and a switchable validity answer.
struct CountingHooks {
    starts: AtomicUsize,
    stops: AtomicUsize,
    polls: AtomicUsize,
    valid: AtomicBool,
}

impl CountingHooks {
    fn new(valid: bool) -> Arc<Self> {
        Arc::new(Self {
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            valid: AtomicBool::new(valid),
        })
    }
}

#[async_trait]
impl LevelHooks for CountingHooks {
    async fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    async fn valid(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.valid.load(Ordering::SeqCst)
    }
}

#[test]
fn duplicate_level_names_are_rejected() {
    let mut machine = StateMachine::new();
    machine
        .add(RunLevel::new("transport", CountingHooks::new(true), POLL))
        .unwrap();
    let err = machine
        .add(RunLevel::new("transport", CountingHooks::new(true), POLL))
        .unwrap_err();
    assert!(matches!(err, SyncError::DuplicateLevel(name) if name == "transport"));
}

#[test]
fn level_names_preserve_insertion_order() {
    let mut machine = StateMachine::new();
    machine
        .add(RunLevel::new("transport", CountingHooks::new(true), POLL))
        .unwrap();
    machine
        .add(RunLevel::new("search", CountingHooks::new(true), POLL))
        .unwrap();
    assert_eq!(machine.level_names(), vec!["transport", "search"]);
}

#[tokio::test]
async fn start_and_stop_hooks_run_exactly_once() {
    let hooks = CountingHooks::new(true);
    let mut machine = StateMachine::new();
    machine
        .add(RunLevel::new("transport", hooks.clone(), POLL))
        .unwrap();

    machine.start();
    assert!(machine.is_running());
    // Starting again is a no-op
    machine.start();

    tokio::time::sleep(Duration::from_millis(30)).await;
    machine.stop();
    machine.wait_stopped().await;

    assert_eq!(hooks.starts.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.stops.load(Ordering::SeqCst), 1);
    assert!(hooks.polls.load(Ordering::SeqCst) >= 1);
    assert!(!machine.is_running());
}

#[tokio::test]
async fn invalid_level_keeps_polling_until_stopped() {
    let hooks = CountingHooks::new(false);
    let mut machine = StateMachine::new();
    machine
        .add(RunLevel::new("search", hooks.clone(), POLL))
        .unwrap();

    machine.start();
    tokio::time::sleep(Duration::from_millis(40)).await;

    // Validity never turning true does not stop the loop
    assert!(hooks.polls.load(Ordering::SeqCst) >= 3);
    assert_eq!(hooks.stops.load(Ordering::SeqCst), 0);

    machine.stop();
    machine.wait_stopped().await;
    assert_eq!(hooks.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn levels_are_supervised_independently() {
    let healthy = CountingHooks::new(true);
    let failing = CountingHooks::new(false);
    let mut machine = StateMachine::new();
    machine
        .add(RunLevel::new("transport", healthy.clone(), POLL))
        .unwrap();
    machine
        .add(RunLevel::new("search", failing.clone(), POLL))
        .unwrap();

    machine.start();
    tokio::time::sleep(Duration::from_millis(40)).await;
    machine.stop();
    machine.wait_stopped().await;

    // The failing sibling never prevented the healthy one from running
    assert!(healthy.polls.load(Ordering::SeqCst) >= 3);
    assert_eq!(healthy.stops.load(Ordering::SeqCst), 1);
    assert_eq!(failing.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn level_changed_fires_on_transitions_only() {
    let hooks = CountingHooks::new(true);
    let transitions: Arc<Mutex<Vec<(String, bool, Option<bool>)>>> =
        Arc::new(Mutex::new(Vec::new()));

    let mut machine = StateMachine::new();
    machine
        .add(RunLevel::new("transport", hooks.clone(), POLL))
        .unwrap();
    let transitions_clone = transitions.clone();
    machine.on_level_changed(Arc::new(move |name, outcome, prev| {
        transitions_clone
            .lock()
            .unwrap()
            .push((name.to_string(), outcome, prev));
    }));

    machine.start();
    tokio::time::sleep(Duration::from_millis(25)).await;
    hooks.valid.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(25)).await;
    machine.stop();
    machine.wait_stopped().await;

    let transitions = transitions.lock().unwrap();
    // First poll reports prev = None, then exactly one flip to false;
    // repeated identical polls in between produced no notifications.
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0], ("transport".to_string(), true, None));
    assert_eq!(transitions[1], ("transport".to_string(), false, Some(true)));
}

#[tokio::test]
async fn restart_waits_for_the_old_loops_to_drain() {
    let hooks = CountingHooks::new(true);
    let mut machine = StateMachine::new();
    machine
        .add(RunLevel::new("transport", hooks.clone(), POLL))
        .unwrap();

    machine.start();
    tokio::time::sleep(Duration::from_millis(20)).await;
    machine.stop();

    // Old loops have not been awaited yet: a premature restart is refused,
    // so every loop still runs its stop hook exactly once.
    machine.start();
    assert!(!machine.is_running());
    machine.wait_stopped().await;
    assert_eq!(hooks.starts.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.stops.load(Ordering::SeqCst), 1);

    // After the drain, the machine restarts cleanly.
    machine.start();
    assert!(machine.is_running());
    tokio::time::sleep(Duration::from_millis(20)).await;
    machine.stop();
    machine.wait_stopped().await;
    assert_eq!(hooks.starts.load(Ordering::SeqCst), 2);
    assert_eq!(hooks.stops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_before_start_is_a_no_op() {
    let mut machine = StateMachine::new();
    machine
        .add(RunLevel::new("transport", CountingHooks::new(true), POLL))
        .unwrap();
    machine.stop();
    machine.wait_stopped().await;
    assert!(!machine.is_running());
}
