//! Handshake credential derivation for Driftsync.
//!
//! Peers prove knowledge of a sync path's shared secret without sending it:
//! each side hashes (own nonce + own certificate fingerprint + secret) with
//! a deliberately expensive, fixed-work-factor KDF and sends the hash. The
//! verifier re-derives the expected material from the peer's nonce and the
//! peer's locally known fingerprint and checks it with the hash library's
//! own verification routine.
//!
//! - Argon2id with fixed parameters for the proof hash (PHC string output)
//! - SHA-256/hex for certificate fingerprints
//! - base64-encoded random nonces

mod error;
mod fingerprint;
mod proof;

pub use error::{CryptoError, CryptoResult};
pub use fingerprint::cert_fingerprint;
pub use proof::{generate_nonce, hash_proof, verify_proof, ProofMaterial, ProofParams, NONCE_BYTES};
