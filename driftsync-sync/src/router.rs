//! Event router: maps command names to ordered handler chains.
//!
//! Decouples "a named thing happened" from "what runs in response".
//! Supports one-shot registrations for request/response correlation,
//! optional FIFO queuing for deferred execution, and an auth-gating mode
//! applied at registration time.

use crate::error::{SyncError, SyncResult};
use crate::event::Event;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Handler outcome: continue down the chain or short-circuit it.
///
/// `Stop` is the sentinel used by validation middleware to prevent later
/// handlers in the same chain from running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// A registered event handler.
pub type Handler = Arc<dyn Fn(&mut Event) -> SyncResult<Flow> + Send + Sync>;

/// Authentication predicate consulted by gated handlers at dispatch time.
pub type AuthStrategy = Arc<dyn Fn() -> bool + Send + Sync>;

/// Default time-to-live for one-shot registrations.
pub const DEFAULT_TEMP_TTL: Duration = Duration::from_secs(30);

struct Registration {
    handler: Handler,
    expires_at: Option<Instant>,
    one_shot: bool,
}

impl Registration {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Routes events to registered handler chains.
pub struct EventRouter {
    routes: HashMap<String, Vec<Registration>>,
    queue: Option<VecDeque<(Vec<Handler>, Event)>>,
    auth_strategy: Option<AuthStrategy>,
    gate_on: bool,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    /// Creates a router in direct-dispatch mode.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            queue: None,
            auth_strategy: None,
            gate_on: false,
        }
    }

    /// Creates a router in queued mode: triggered events are held in a
    /// FIFO queue until [`EventRouter::commit`] drains it.
    pub fn queued() -> Self {
        Self {
            queue: Some(VecDeque::new()),
            ..Self::new()
        }
    }

    /// Installs the authentication strategy used by gated registrations.
    pub fn set_auth_strategy(&mut self, strategy: AuthStrategy) {
        self.auth_strategy = Some(strategy);
    }

    /// Requires authentication on all routes registered from now on.
    ///
    /// Affects future registrations only; already-registered handlers are
    /// not retroactively wrapped.
    pub fn auth_strategy_on(&mut self) {
        self.gate_on = true;
    }

    /// Stops requiring authentication on newly registered routes.
    pub fn auth_strategy_off(&mut self) {
        self.gate_on = false;
    }

    /// Appends `handler` to the ordered chain for `name`.
    ///
    /// Fails with [`SyncError::AuthConfig`] when gating is enabled but no
    /// strategy was configured: fail fast at setup, not at dispatch time.
    pub fn register(&mut self, name: impl Into<String>, handler: Handler) -> SyncResult<()> {
        self.register_with_ttl(name, handler, None)
    }

    /// Like [`EventRouter::register`], with an expiry on the registration.
    pub fn register_with_ttl(
        &mut self,
        name: impl Into<String>,
        handler: Handler,
        ttl: Option<Duration>,
    ) -> SyncResult<()> {
        let name = name.into();
        let handler = self.maybe_gate(&name, handler)?;
        self.routes.entry(name).or_default().push(Registration {
            handler,
            expires_at: ttl.map(|t| Instant::now() + t),
            one_shot: false,
        });
        Ok(())
    }

    /// Registers a one-shot handler under a generated correlation token and
    /// returns the token.
    ///
    /// The caller embeds the token as an outgoing event's `rcode`; the
    /// peer's eventual reply event is routed to exactly this handler, which
    /// is removed after one dispatch. Unmatched registrations expire after
    /// `ttl` (checked lazily on lookup and by [`EventRouter::sweep_expired`]).
    pub fn temp(&mut self, handler: Handler, ttl: Duration) -> String {
        let token = Uuid::new_v4().to_string();
        self.routes.insert(
            token.clone(),
            vec![Registration {
                handler,
                expires_at: Some(Instant::now() + ttl),
                one_shot: true,
            }],
        );
        token
    }

    /// Looks up handlers for the event's name and dispatches (or queues)
    /// them. Returns true iff handlers existed.
    pub fn trigger(&mut self, event: Event) -> bool {
        let handlers = self.take_live_handlers(&event.name);
        if handlers.is_empty() {
            self.handler_missing(&event);
            return false;
        }
        match &mut self.queue {
            Some(queue) => queue.push_back((handlers, event)),
            None => Self::dispatch(&handlers, event),
        }
        true
    }

    /// Drains the queue strictly in FIFO order. No-op when empty or when
    /// the router is in direct mode.
    pub fn commit(&mut self) {
        let Some(queue) = &mut self.queue else { return };
        while let Some((handlers, event)) = queue.pop_front() {
            Self::dispatch(&handlers, event);
        }
    }

    /// Drops every expired registration, pruning empty routes.
    ///
    /// Lazy expiry on lookup already keeps stale one-shots from firing;
    /// this sweep reclaims registrations whose reply never arrives.
    pub fn sweep_expired(&mut self) {
        let now = Instant::now();
        self.routes.retain(|name, regs| {
            let before = regs.len();
            regs.retain(|r| !r.expired(now));
            if regs.len() < before {
                debug!(route = %name, dropped = before - regs.len(), "expired registrations swept");
            }
            !regs.is_empty()
        });
    }

    /// Number of live registrations for `name`. Test/introspection helper.
    pub fn route_len(&self, name: &str) -> usize {
        let now = Instant::now();
        self.routes
            .get(name)
            .map(|regs| regs.iter().filter(|r| !r.expired(now)).count())
            .unwrap_or(0)
    }

    /// Runs handlers in registration order, honoring the `Stop` sentinel.
    ///
    /// A handler error aborts the chain and is reported through the event's
    /// error continuation if present, otherwise logged. Errors never
    /// propagate to the trigger call site.
    fn dispatch(handlers: &[Handler], mut event: Event) {
        for handler in handlers {
            match handler(&mut event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) => {
                    warn!(event = %event.name, error = %e, "handler failed, aborting chain");
                    if let Some(error_with) = event.take_error() {
                        error_with(e);
                    }
                    break;
                }
            }
        }
    }

    /// Invoked when an event has no registered handlers.
    fn handler_missing(&self, event: &Event) {
        warn!(event = %event.name, "handler missing");
    }

    /// Clones the live handler chain for `name`, expiring stale
    /// registrations and consuming one-shot ones.
    fn take_live_handlers(&mut self, name: &str) -> Vec<Handler> {
        let now = Instant::now();
        let Some(regs) = self.routes.get_mut(name) else {
            return Vec::new();
        };
        regs.retain(|r| !r.expired(now));
        let handlers: Vec<Handler> = regs.iter().map(|r| r.handler.clone()).collect();
        regs.retain(|r| !r.one_shot);
        if regs.is_empty() {
            self.routes.remove(name);
        }
        handlers
    }

    fn maybe_gate(&self, name: &str, handler: Handler) -> SyncResult<Handler> {
        if !self.gate_on {
            return Ok(handler);
        }
        let Some(strategy) = self.auth_strategy.clone() else {
            return Err(SyncError::AuthConfig(format!(
                "no auth strategy configured for route: {name}"
            )));
        };
        Ok(Arc::new(move |event: &mut Event| {
            if !strategy() {
                return Err(SyncError::AuthRequired);
            }
            handler(event)
        }))
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("routes", &self.routes.len())
            .field("queued", &self.queue.is_some())
            .field("gate_on", &self.gate_on)
            .finish()
    }
}
