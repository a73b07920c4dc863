//! Error types for the sync layer.
//!
//! The taxonomy distinguishes conditions a caller must branch on:
//! session fields that were never set vs. set twice, incomplete handshakes
//! vs. failed proofs, and configuration mistakes (which fail loudly at
//! setup) vs. per-message errors (which degrade gracefully).

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required parameter key was absent from an event's bag.
    #[error("missing parameter key: {key}")]
    MissingKey { key: String },

    /// A parameter bag (or nested value) was not a structured map.
    #[error("malformed parameters: {0}")]
    BadParams(String),

    /// Auth gating was enabled on a router with no strategy configured.
    /// Fatal at registration time: a silently unprotected route is a
    /// security defect.
    #[error("auth configuration error: {0}")]
    AuthConfig(String),

    /// A gated handler ran before the session authenticated.
    #[error("authentication required")]
    AuthRequired,

    /// A session field was read before being set.
    #[error("session field not set: {0}")]
    NotSet(&'static str),

    /// A write-once session field was assigned twice.
    #[error("session field already set: {0}")]
    AlreadySet(&'static str),

    /// A peer nonce fell below the entropy floor.
    #[error("peer nonce too short: {len} bytes, minimum {min}")]
    NonceTooShort { len: usize, min: usize },

    /// A sync path lookup returned nothing.
    #[error("sync path not found")]
    SyncPathNotFound,

    /// Proof verification failed: the peer completed setup but proved the
    /// wrong secret. Distinct from the initialization errors above.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A run level with this name already exists in the state machine.
    #[error("duplicate run level: {0}")]
    DuplicateLevel(String),

    /// Message framing error (oversize message, malformed chunk).
    #[error("framing error: {0}")]
    Framing(String),

    /// Credential derivation error.
    #[error(transparent)]
    Crypto(#[from] driftsync_crypto::CryptoError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File record store error.
    #[error("store error: {0}")]
    Store(String),
}
