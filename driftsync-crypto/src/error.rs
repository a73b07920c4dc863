//! Error types for the credential layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Proof hashing failed.
    #[error("proof derivation failed: {0}")]
    ProofDerivation(String),

    /// A stored proof hash could not be parsed.
    #[error("malformed proof hash: {0}")]
    MalformedHash(String),
}
