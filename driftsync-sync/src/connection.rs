//! Capability-composed peer connection.
//!
//! A [`PeerConnection`] owns the session, router, framing buffer, and run-
//! level state machine for one remote peer. Capabilities (handshake
//! responder, messaging, discovery levels, collaborator notifications) are
//! independently-constructed components wired together at build time by
//! [`ConnectionBuilder`] — there is no runtime augmentation.
//!
//! Data flow: the transport delivers raw chunks to
//! [`PeerConnection::handle_chunk`] → the framing buffer reassembles them
//! into a wire message → the router dispatches to registered handlers →
//! handler replies are chunked again and handed back to the transport.

use crate::error::SyncResult;
use crate::event::{Event, Params, ReplyFn, Status};
use crate::framing::{self, MsgBuffer, StreamKey, TrafficClass, WireMessage};
use crate::protocol::{self, commands};
use crate::router::{EventRouter, Flow, Handler, DEFAULT_TEMP_TTL};
use crate::runlevel::{LevelChanged, RunLevel, StateMachine};
use crate::session::{AuthorizeParams, AuthorizeReply, Session};
use crate::transport::ChunkTransport;
use driftsync_types::{PeerId, SyncPath, SyncPathId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Looks up a sync path by its public identifier. `None` means unknown.
pub type SyncPathResolver = Arc<dyn Fn(SyncPathId) -> Option<SyncPath> + Send + Sync>;

/// Collaborator notification: a peer announced itself for a sync path.
pub type NewPeerFn = Arc<dyn Fn(PeerId, SyncPathId) + Send + Sync>;

/// Collaborator notification: a remote filesystem event arrived (opaque
/// payload, consumed by the watcher/scanner).
pub type FsEventFn = Arc<dyn Fn(PeerId, serde_json::Value) + Send + Sync>;

/// One authenticated (or authenticating) link to a remote peer.
pub struct PeerConnection {
    remote_peer_id: PeerId,
    session: Arc<Session>,
    router: EventRouter,
    buffer: MsgBuffer,
    machine: StateMachine,
    transport: Arc<dyn ChunkTransport>,
}

impl PeerConnection {
    /// The remote peer.
    pub fn remote_peer_id(&self) -> PeerId {
        self.remote_peer_id
    }

    /// The local peer.
    pub fn local_peer_id(&self) -> PeerId {
        self.session.local_peer_id()
    }

    /// The connection's session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether the handshake has completed successfully.
    pub fn is_authenticated(&self) -> bool {
        self.session.authenticated()
    }

    /// Mutable access to the router, for registering custom routes.
    pub fn router_mut(&mut self) -> &mut EventRouter {
        &mut self.router
    }

    /// Starts the connection's run levels.
    pub fn start(&mut self) {
        self.machine.start();
    }

    /// Signals the run levels to stop at their next poll.
    pub fn stop(&mut self) {
        self.machine.stop();
    }

    /// Awaits run-level shutdown after [`PeerConnection::stop`].
    pub async fn wait_stopped(&mut self) {
        self.machine.wait_stopped().await;
    }

    /// Drains the router's queue (queued-dispatch mode only).
    pub fn commit(&mut self) {
        self.router.commit();
    }

    /// Reclaims expired one-shot registrations.
    pub fn sweep_expired(&mut self) {
        self.router.sweep_expired();
    }

    /// Starts the handshake as initiator: sends this peer's authorize
    /// payload and completes mutual authentication when the reply arrives.
    ///
    /// The session's sync path must be bound before calling.
    pub fn begin_handshake(&mut self) -> SyncResult<()> {
        let payload = self.session.authorize_params()?;
        let session = self.session.clone();
        let on_reply: Handler = Arc::new(move |event: &mut Event| {
            let reply: AuthorizeReply = event.params.parse()?;
            session.authorize(&reply.rand, &reply.enc_pass)?;
            debug!(peer = %session.local_peer_id(), "handshake completed as initiator");
            Ok(Flow::Continue)
        });
        self.send_command(
            commands::AUTHORIZE,
            Status::Ok,
            protocol::authorize_params(&payload)?,
            Some(on_reply),
        )
    }

    /// Sends a command to the remote peer, chunked for the transport.
    ///
    /// When `reply` is supplied, a one-shot registration is created and its
    /// token embedded as the outgoing correlation code; the peer's reply
    /// event routes to exactly that handler.
    pub fn send_command(
        &mut self,
        command: &str,
        status: Status,
        params: Params,
        reply: Option<Handler>,
    ) -> SyncResult<()> {
        let rcode = match reply {
            Some(handler) => self.router.temp(handler, DEFAULT_TEMP_TTL),
            None => String::new(),
        };
        let message = WireMessage::new(command, status, params.to_value()).with_rcode(rcode);
        let peer = self.remote_peer_id;
        for chunk in framing::split_message(&message)? {
            if !self.transport.send(peer, &chunk) {
                // Best effort: the rest of a partial message is useless.
                warn!(%peer, command, "transport refused chunk, abandoning send");
                break;
            }
        }
        Ok(())
    }

    /// Feeds one incoming transport chunk. Complete messages are
    /// dispatched through the router; incomplete streams return silently
    /// until more chunks arrive.
    pub fn handle_chunk(&mut self, class: TrafficClass, chunk: &[u8]) {
        let key = StreamKey::new(self.remote_peer_id, class);
        let Some(message) = self.buffer.receive(key, chunk) else {
            return;
        };
        self.dispatch_message(class, message);
    }

    fn dispatch_message(&mut self, class: TrafficClass, message: WireMessage) {
        let peer = self.remote_peer_id;
        if message.version != protocol::PROTOCOL_VERSION {
            warn!(
                %peer,
                version = message.version,
                supported = protocol::PROTOCOL_VERSION,
                "dropping message with unsupported protocol version"
            );
            return;
        }
        let params = match Params::from_value(message.params) {
            Ok(params) => params,
            Err(e) => {
                warn!(%peer, command = %message.command, error = %e, "dropping message with malformed params");
                return;
            }
        };
        let mut event = Event::new(message.command)
            .with_status(message.status)
            .with_source(peer)
            .with_params(params);
        if !message.rcode.is_empty() {
            let reply = make_reply_fn(self.transport.clone(), peer, class);
            event = event.with_rcode(message.rcode).with_reply(reply);
        }
        self.router.trigger(event);
    }
}

impl std::fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("remote", &self.remote_peer_id)
            .field("authenticated", &self.is_authenticated())
            .field("machine", &self.machine)
            .finish()
    }
}

/// Builds the continuation that carries a handler's reply back over the
/// wire, correlated by the incoming event's rcode.
fn make_reply_fn(transport: Arc<dyn ChunkTransport>, peer: PeerId, class: TrafficClass) -> ReplyFn {
    Box::new(move |reply_event: Event| {
        let message = WireMessage::new(
            reply_event.name,
            reply_event.status,
            reply_event.params.to_value(),
        );
        match framing::split_message(&message) {
            Ok(chunks) => {
                for chunk in chunks {
                    if !transport.send(peer, &chunk) {
                        warn!(%peer, ?class, "transport refused reply chunk");
                        break;
                    }
                }
            }
            Err(e) => warn!(%peer, error = %e, "could not frame reply"),
        }
    })
}

/// Wires a connection's capabilities together at construction time.
pub struct ConnectionBuilder {
    session: Session,
    remote_peer_id: PeerId,
    transport: Arc<dyn ChunkTransport>,
    queued: bool,
    resolver: Option<SyncPathResolver>,
    messaging: bool,
    on_new_peer: Option<NewPeerFn>,
    on_fs_event: Option<FsEventFn>,
    levels: Vec<RunLevel>,
    level_changed: Option<LevelChanged>,
}

impl ConnectionBuilder {
    /// Starts a builder for a connection to `remote_peer_id`.
    pub fn new(
        session: Session,
        remote_peer_id: PeerId,
        transport: Arc<dyn ChunkTransport>,
    ) -> Self {
        Self {
            session,
            remote_peer_id,
            transport,
            queued: false,
            resolver: None,
            messaging: false,
            on_new_peer: None,
            on_fs_event: None,
            levels: Vec::new(),
            level_changed: None,
        }
    }

    /// Defers handler execution to explicit [`PeerConnection::commit`]
    /// calls instead of dispatching in the receive path.
    pub fn queued_dispatch(mut self) -> Self {
        self.queued = true;
        self
    }

    /// Adds the handshake-responder capability: incoming `authorize`
    /// commands bind the requested sync path via `resolver` and run the
    /// mutual proof exchange.
    pub fn with_handshake(mut self, resolver: SyncPathResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Adds the messaging capability (ping liveness route).
    pub fn with_messaging(mut self) -> Self {
        self.messaging = true;
        self
    }

    /// Adds a supervised run level (e.g. transport bootstrap, peer
    /// search).
    pub fn with_level(mut self, level: RunLevel) -> Self {
        self.levels.push(level);
        self
    }

    /// Installs the per-level transition hook.
    pub fn on_level_changed(mut self, hook: LevelChanged) -> Self {
        self.level_changed = Some(hook);
        self
    }

    /// Installs the peer-discovered collaborator notification
    /// (authenticated peers only).
    pub fn on_new_peer(mut self, hook: NewPeerFn) -> Self {
        self.on_new_peer = Some(hook);
        self
    }

    /// Installs the remote-filesystem-event collaborator notification
    /// (authenticated peers only).
    pub fn on_fs_event(mut self, hook: FsEventFn) -> Self {
        self.on_fs_event = Some(hook);
        self
    }

    /// Assembles the connection.
    pub fn build(self) -> SyncResult<PeerConnection> {
        let session = Arc::new(self.session);
        let mut router = if self.queued {
            EventRouter::queued()
        } else {
            EventRouter::new()
        };

        // Gated routes check the session at dispatch time.
        let auth_session = session.clone();
        router.set_auth_strategy(Arc::new(move || auth_session.authenticated()));

        // Pre-auth routes: the handshake itself and liveness probes.
        if let Some(resolver) = self.resolver {
            let handshake_session = session.clone();
            router.register(
                commands::AUTHORIZE,
                Arc::new(move |event: &mut Event| {
                    let payload: AuthorizeParams = event.params.parse()?;
                    if handshake_session.sync_path().is_err() {
                        handshake_session.set_sync_path(resolver(payload.guid))?;
                    }
                    let reply = handshake_session.authorize(&payload.rand, &payload.enc_pass)?;
                    debug!("handshake completed as responder");
                    event.reply(Status::Ok, protocol::authorize_reply(&reply)?);
                    Ok(Flow::Continue)
                }),
            )?;
        }
        if self.messaging {
            router.register(
                commands::PING,
                Arc::new(|event: &mut Event| {
                    if event.can_reply() {
                        event.reply(Status::Ok, Params::new());
                    }
                    Ok(Flow::Continue)
                }),
            )?;
        }

        // Everything below requires a completed handshake.
        router.auth_strategy_on();
        if let Some(on_fs_event) = self.on_fs_event {
            let remote = self.remote_peer_id;
            router.register(
                commands::FS_EVENT,
                Arc::new(move |event: &mut Event| {
                    let source = event.source.unwrap_or(remote);
                    on_fs_event(source, event.params.to_value());
                    Ok(Flow::Continue)
                }),
            )?;
        }
        if let Some(on_new_peer) = self.on_new_peer {
            let remote = self.remote_peer_id;
            router.register(
                commands::PEER_DISCOVERED,
                Arc::new(move |event: &mut Event| {
                    event.params.require(["guid"]);
                    let guid: SyncPathId =
                        serde_json::from_value(event.params.val("guid")?.clone())?;
                    let source = event.source.unwrap_or(remote);
                    on_new_peer(source, guid);
                    Ok(Flow::Continue)
                }),
            )?;
        }
        router.auth_strategy_off();

        let mut machine = StateMachine::new();
        if let Some(hook) = self.level_changed {
            machine.on_level_changed(hook);
        }
        for level in self.levels {
            machine.add(level)?;
        }

        Ok(PeerConnection {
            remote_peer_id: self.remote_peer_id,
            session,
            router,
            buffer: MsgBuffer::new(),
            machine,
            transport: self.transport,
        })
    }
}
