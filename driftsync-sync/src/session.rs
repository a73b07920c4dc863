//! Per-connection mutual authentication session.
//!
//! Both peers prove knowledge of a sync path's shared secret without
//! sending it: each hashes (own nonce + own certificate fingerprint +
//! secret) and the other side re-derives the expected material from the
//! nonce it received and the fingerprint it already knows for that peer.
//!
//! Session identity fields are write-once. The first assignment wins and
//! any later one fails, so a compromised or buggy peer cannot re-bind
//! session identity mid-handshake. `authenticated` is terminal for the
//! session's lifetime.

use crate::error::{SyncError, SyncResult};
use base64::Engine;
use driftsync_crypto::{
    generate_nonce, hash_proof, verify_proof, ProofMaterial, ProofParams,
};
use driftsync_types::{PeerId, SyncPath};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Minimum peer nonce entropy, in bytes.
pub const MIN_NONCE_BYTES: usize = 50;

/// A write-once cell: the first `set` succeeds, later ones fail, and `get`
/// fails while unset. Concurrent setters are serialized by the underlying
/// `OnceLock`, so exactly one wins.
#[derive(Debug)]
pub struct SetOnce<T> {
    cell: OnceLock<T>,
    field: &'static str,
}

impl<T> SetOnce<T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            cell: OnceLock::new(),
            field,
        }
    }

    /// Stores the value, failing with `AlreadySet` on a second call
    /// regardless of value equality.
    pub fn set(&self, value: T) -> SyncResult<()> {
        self.cell
            .set(value)
            .map_err(|_| SyncError::AlreadySet(self.field))
    }

    /// Reads the value, failing with `NotSet` while unset. Never returns
    /// a default.
    pub fn get(&self) -> SyncResult<&T> {
        self.cell.get().ok_or(SyncError::NotSet(self.field))
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// What this peer knows about the remote host it is talking to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub peer_id: PeerId,
    /// Locally-known fingerprint of the peer's certificate. Used to verify
    /// the peer's proof; never taken from the wire.
    pub cert_fingerprint: String,
}

/// This peer's own credential inputs.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    pub peer_id: PeerId,
    pub cert_fingerprint: String,
}

/// The initiator's half of the handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeParams {
    pub rand: String,
    pub guid: driftsync_types::SyncPathId,
    pub enc_pass: String,
}

/// The responder's half of the handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeReply {
    pub rand: String,
    pub enc_pass: String,
}

/// Holds one connection attempt's session variables and decides whether
/// the connected peer is authenticated.
pub struct Session {
    local: LocalIdentity,
    rand: String,
    params: ProofParams,
    host: SetOnce<Host>,
    sync_path: SetOnce<SyncPath>,
    peer_rand: SetOnce<String>,
    /// Memoized: the hash is expensive and derived once from stable inputs.
    enc_pass: OnceLock<String>,
    authenticated: AtomicBool,
}

impl Session {
    /// Creates a fresh session with a new local nonce and the default
    /// (production) proof work factor.
    pub fn new(local: LocalIdentity) -> Self {
        Self::with_params(local, ProofParams::default())
    }

    /// Creates a session with explicit proof parameters.
    pub fn with_params(local: LocalIdentity, params: ProofParams) -> Self {
        Self {
            local,
            rand: generate_nonce(),
            params,
            host: SetOnce::new("host"),
            sync_path: SetOnce::new("sync_path"),
            peer_rand: SetOnce::new("peer_rand"),
            enc_pass: OnceLock::new(),
            authenticated: AtomicBool::new(false),
        }
    }

    /// This session's own nonce.
    pub fn rand(&self) -> &str {
        &self.rand
    }

    /// The local peer this session authenticates for.
    pub fn local_peer_id(&self) -> PeerId {
        self.local.peer_id
    }

    /// Whether a successful `authorize` call has completed.
    pub fn authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Binds the remote host. Write-once.
    pub fn set_host(&self, host: Host) -> SyncResult<()> {
        self.host.set(host)
    }

    /// The remote host, failing with a not-set error before the bind.
    pub fn host(&self) -> SyncResult<&Host> {
        self.host.get()
    }

    /// Binds the sync path selected by the peer. Write-once. `None` means
    /// a lookup returned nothing and fails with `SyncPathNotFound`.
    pub fn set_sync_path(&self, sync_path: Option<SyncPath>) -> SyncResult<()> {
        let sync_path = sync_path.ok_or(SyncError::SyncPathNotFound)?;
        self.sync_path.set(sync_path)
    }

    /// The bound sync path.
    pub fn sync_path(&self) -> SyncResult<&SyncPath> {
        self.sync_path.get()
    }

    /// Records the peer's nonce. Write-once, entropy-validated before any
    /// hash work: a trivially short nonce is rejected outright.
    pub fn set_peer_rand(&self, value: impl Into<String>) -> SyncResult<()> {
        let value = value.into();
        let entropy = nonce_entropy(&value);
        if entropy < MIN_NONCE_BYTES {
            return Err(SyncError::NonceTooShort {
                len: entropy,
                min: MIN_NONCE_BYTES,
            });
        }
        self.peer_rand.set(value)
    }

    /// The peer's nonce.
    pub fn peer_rand(&self) -> SyncResult<&String> {
        self.peer_rand.get()
    }

    /// This peer's proof hash, memoized after first computation.
    pub fn encrypted_password(&self) -> SyncResult<String> {
        if let Some(phc) = self.enc_pass.get() {
            return Ok(phc.clone());
        }
        let sync_path = self.sync_path.get()?;
        let material =
            ProofMaterial::assemble(&self.rand, &self.local.cert_fingerprint, &sync_path.password);
        let phc = hash_proof(&material, &self.params)?;
        // A concurrent caller may have won the race; either value verifies.
        Ok(self.enc_pass.get_or_init(|| phc).clone())
    }

    /// Returns the initiator payload: this peer's nonce, the target sync
    /// path's public identifier, and this peer's proof hash.
    pub fn authorize_params(&self) -> SyncResult<AuthorizeParams> {
        Ok(AuthorizeParams {
            rand: self.rand.clone(),
            guid: self.sync_path.get()?.guid,
            enc_pass: self.encrypted_password()?,
        })
    }

    /// Verifies the peer's proof and, on success, marks the session
    /// authenticated and returns this peer's own half so the caller can
    /// complete the handshake.
    ///
    /// Fails with `AuthFailed` on a proof mismatch, which callers must
    /// treat differently from the initialization errors: setup completed,
    /// but the peer proved the wrong secret.
    pub fn authorize(&self, peer_rand: &str, peer_enc_pass: &str) -> SyncResult<AuthorizeReply> {
        self.set_peer_rand(peer_rand)?;
        let host = self.host.get()?;
        let sync_path = self.sync_path.get()?;
        let material = ProofMaterial::assemble(
            self.peer_rand.get()?,
            &host.cert_fingerprint,
            &sync_path.password,
        );
        let valid = verify_proof(&material, peer_enc_pass)
            .map_err(|e| SyncError::AuthFailed(e.to_string()))?;
        if !valid {
            return Err(SyncError::AuthFailed(
                "authorization of peer failed".to_string(),
            ));
        }
        self.authenticated.store(true, Ordering::Release);
        Ok(AuthorizeReply {
            rand: self.rand.clone(),
            enc_pass: self.encrypted_password()?,
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("local_peer", &self.local.peer_id)
            .field("host", &self.host.is_set())
            .field("sync_path", &self.sync_path.is_set())
            .field("peer_rand", &self.peer_rand.is_set())
            .field("authenticated", &self.authenticated())
            .finish()
    }
}

/// Entropy of a nonce in bytes: decoded length when it parses as base64,
/// raw byte length otherwise.
fn nonce_entropy(value: &str) -> usize {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map(|bytes| bytes.len())
        .unwrap_or(value.len())
}
