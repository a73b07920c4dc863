//! Run-level state machine.
//!
//! Each independently-recoverable sub-concern of a connection (transport
//! bootstrap, peer search, ...) is modeled as its own supervised loop
//! rather than one monolithic connect/disconnect flag. A level's `valid()`
//! turning false does not stop it — degraded-but-retrying is normal; a
//! level only stops when the owning machine clears its `should_run` flag.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle hooks supplied by the code owning a run level.
///
/// `start` runs once when the machine starts, `valid` is polled on the
/// level's interval, and `stop` runs exactly once when the level winds
/// down. Escalation policy (e.g. re-running `start` on repeated failure)
/// belongs to the implementor.
#[async_trait]
pub trait LevelHooks: Send + Sync {
    async fn start(&self);
    async fn stop(&self);
    async fn valid(&self) -> bool;
}

/// An independently start/stop/validity-checked sub-lifecycle.
pub struct RunLevel {
    name: String,
    hooks: Arc<dyn LevelHooks>,
    interval: Duration,
    should_run: Arc<AtomicBool>,
}

impl RunLevel {
    /// Creates a stopped run level.
    pub fn new(name: impl Into<String>, hooks: Arc<dyn LevelHooks>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            hooks,
            interval,
            should_run: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The level's name, unique within its state machine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signals the level's loop to wind down at its next poll.
    pub fn request_stop(&self) {
        self.should_run.store(false, Ordering::Release);
    }

    /// Whether the level's loop has been asked to keep running.
    pub fn should_run(&self) -> bool {
        self.should_run.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RunLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLevel")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("should_run", &self.should_run())
            .finish()
    }
}

/// Notification hook fired on every individual level transition.
///
/// Arguments: level name, new validity outcome, previous outcome (`None`
/// on the first poll after start).
pub type LevelChanged = Arc<dyn Fn(&str, bool, Option<bool>) + Send + Sync>;

/// Aggregates run levels into a single running/stopped machine.
///
/// Levels are independent: one level failing indefinitely neither stops
/// nor restarts its siblings.
pub struct StateMachine {
    levels: Vec<RunLevel>,
    handles: Vec<JoinHandle<()>>,
    level_changed: Option<LevelChanged>,
    running: bool,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Creates an empty, stopped machine.
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            handles: Vec::new(),
            level_changed: None,
            running: false,
        }
    }

    /// Adds a level. Insertion order is preserved; duplicate names are
    /// rejected.
    pub fn add(&mut self, level: RunLevel) -> SyncResult<()> {
        if self.levels.iter().any(|l| l.name == level.name) {
            return Err(SyncError::DuplicateLevel(level.name));
        }
        self.levels.push(level);
        Ok(())
    }

    /// Installs the per-level transition notification hook.
    pub fn on_level_changed(&mut self, hook: LevelChanged) {
        self.level_changed = Some(hook);
    }

    /// Names of the owned levels, in insertion order.
    pub fn level_names(&self) -> Vec<&str> {
        self.levels.iter().map(|l| l.name()).collect()
    }

    /// Whether the machine has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts every owned level: runs its `start()` hook once, then polls
    /// `valid()` on the level's interval in its own task.
    ///
    /// A no-op while running, and also after [`StateMachine::stop`] until
    /// [`StateMachine::wait_stopped`] has drained the old loops: restarting
    /// before they exit would re-raise `should_run` and skip their `stop()`
    /// hooks.
    pub fn start(&mut self) {
        if self.running || !self.handles.is_empty() {
            return;
        }
        self.running = true;
        for level in &self.levels {
            level.should_run.store(true, Ordering::Release);
            let name = level.name.clone();
            let hooks = level.hooks.clone();
            let interval = level.interval;
            let should_run = level.should_run.clone();
            let notify = self.level_changed.clone();
            self.handles.push(tokio::spawn(async move {
                hooks.start().await;
                debug!(level = %name, "run level started");
                let mut prev: Option<bool> = None;
                while should_run.load(Ordering::Acquire) {
                    let outcome = hooks.valid().await;
                    if prev != Some(outcome) {
                        debug!(level = %name, valid = outcome, "run level transition");
                        if let Some(notify) = &notify {
                            notify(&name, outcome, prev);
                        }
                        prev = Some(outcome);
                    }
                    tokio::time::sleep(interval).await;
                }
                hooks.stop().await;
                debug!(level = %name, "run level stopped");
            }));
        }
    }

    /// Clears `should_run` on every level. Each loop observes this at its
    /// next poll and runs its `stop()` hook exactly once; in-flight work
    /// is allowed to finish.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        for level in &self.levels {
            level.request_stop();
        }
    }

    /// Waits for every level's loop to exit. Call after
    /// [`StateMachine::stop`] when shutdown must be observed.
    pub async fn wait_stopped(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("levels", &self.level_names())
            .field("running", &self.running)
            .finish()
    }
}
