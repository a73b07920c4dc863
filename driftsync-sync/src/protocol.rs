//! Wire command names and payload conversion helpers.
//!
//! Every reassembled application message carries `{command, status,
//! params}`; a response correlates via the `rcode` token matching a
//! one-shot router registration.

use crate::error::SyncResult;
use crate::event::Params;
use crate::session::{AuthorizeParams, AuthorizeReply};
use serde::Serialize;

/// Protocol version carried on every wire message; connections drop
/// messages tagged with any other version on ingress.
pub const PROTOCOL_VERSION: u32 = 1;

/// Well-known command names.
pub mod commands {
    /// Mutual handshake request. Payload: [`AuthorizeParams`](super::AuthorizeParams).
    pub const AUTHORIZE: &str = "authorize";
    /// Liveness probe; replies with an empty ok.
    pub const PING: &str = "ping";
    /// A remote replica saw a filesystem change (opaque payload, consumed
    /// by the local watcher/scanner collaborators).
    pub const FS_EVENT: &str = "fs_event";
    /// A peer announced itself for a sync path.
    pub const PEER_DISCOVERED: &str = "peer_discovered";
}

/// Serializes a typed payload into a parameter bag.
pub fn to_params<T: Serialize>(payload: &T) -> SyncResult<Params> {
    Params::from_value(serde_json::to_value(payload)?)
}

/// Builds the initiator's handshake bag.
pub fn authorize_params(payload: &AuthorizeParams) -> SyncResult<Params> {
    to_params(payload)
}

/// Builds the responder's handshake bag.
pub fn authorize_reply(payload: &AuthorizeReply) -> SyncResult<Params> {
    to_params(payload)
}
