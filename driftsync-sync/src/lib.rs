//! Peer communication and reconciliation layer for Driftsync.
//!
//! Driftsync is a decentralized, peer-to-peer file-synchronization agent.
//! This crate is its core: it decides which peer may synchronize which
//! sync path, reconciles divergent file state between replicas, and
//! notifies local subsystems of remote changes — all on top of a transport
//! that offers small, unordered, unreliable chunks and nothing else.
//!
//! # Components
//!
//! - **Event & Params** ([`event`]): named commands with key-validated
//!   parameter bags and reply/error continuations
//! - **Event Router** ([`router`]): ordered handler chains, one-shot
//!   request/response correlation, FIFO queuing, auth gating
//! - **Run-Level State Machine** ([`runlevel`]): independently supervised
//!   sub-lifecycles per connection concern
//! - **Message Framing** ([`framing`]): arbitrary-size messages over
//!   bounded chunks, multiplexed per (peer, traffic class) stream
//! - **Session Authenticator** ([`session`]): mutual password-derived
//!   proof with write-once session identity
//! - **Difference Reconciler** ([`difference`]): divergence detection
//!   between two replicas' tracked file state
//! - **Peer Connection** ([`connection`]): capability composition wiring
//!   the above together for one remote peer
//!
//! # Example
//!
//! ```
//! use driftsync_sync::session::{LocalIdentity, Session};
//! use driftsync_types::{PeerId, SyncPath};
//!
//! let local = LocalIdentity {
//!     peer_id: PeerId::new(),
//!     cert_fingerprint: driftsync_crypto::cert_fingerprint(b"my cert"),
//! };
//! let session = Session::new(local);
//! session
//!     .set_sync_path(Some(SyncPath::new("/music", "shared-secret")))
//!     .unwrap();
//! assert!(!session.authenticated());
//! ```

pub mod config;
pub mod connection;
pub mod difference;
mod error;
pub mod event;
pub mod framing;
pub mod protocol;
pub mod router;
pub mod runlevel;
pub mod session;
pub mod transport;

pub use config::{init_logging, LogConfig, LogStyle};
pub use connection::{ConnectionBuilder, FsEventFn, NewPeerFn, PeerConnection, SyncPathResolver};
pub use difference::{between_sync_paths, Divergence, DivergenceKind, FileRecordStore, Side};
pub use error::{SyncError, SyncResult};
pub use event::{Event, Params, Status};
pub use framing::{
    MsgBuffer, StreamKey, TrafficClass, WireMessage, MAX_CHUNK_BODY, MAX_CHUNK_SIZE,
    MAX_MESSAGE_SIZE,
};
pub use router::{EventRouter, Flow, Handler, DEFAULT_TEMP_TTL};
pub use runlevel::{LevelHooks, RunLevel, StateMachine};
pub use session::{
    AuthorizeParams, AuthorizeReply, Host, LocalIdentity, Session, SetOnce, MIN_NONCE_BYTES,
};
pub use transport::ChunkTransport;
