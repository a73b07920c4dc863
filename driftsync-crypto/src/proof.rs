//! Password-proof derivation and verification.
//!
//! Uses Argon2id with a fixed work factor. The proof material is the
//! concatenation of a nonce, a certificate fingerprint, and the sync path's
//! shared secret; only its hash ever crosses the wire.

use crate::error::{CryptoError, CryptoResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params, Version};
use base64::Engine;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a generated nonce in bytes, before base64 encoding.
pub const NONCE_BYTES: usize = 64;

/// Proof hashing parameters (fixed work factor).
///
/// The cost is deliberate: an attacker who captures a proof hash must pay
/// this per guess of the shared secret.
#[derive(Clone, Debug)]
pub struct ProofParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
}

impl Default for ProofParams {
    fn default() -> Self {
        // OWASP recommendations for Argon2id (2023)
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl ProofParams {
    /// Creates parameters for testing (fast but insecure).
    pub fn test() -> Self {
        Self {
            memory_cost: 1024, // 1 MiB
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Concatenated proof input, zeroized on drop.
///
/// Holds (nonce + certificate fingerprint + shared secret) while a hash is
/// being derived or verified.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ProofMaterial(String);

impl ProofMaterial {
    /// Assembles proof material from its three components.
    pub fn assemble(nonce: &str, cert_fingerprint: &str, secret: &str) -> Self {
        Self(format!("{nonce}{cert_fingerprint}{secret}"))
    }

    /// Returns the material bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for ProofMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProofMaterial").field(&"[REDACTED]").finish()
    }
}

fn argon2(params: &ProofParams) -> CryptoResult<Argon2<'static>> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        None,
    )
    .map_err(|e| CryptoError::ProofDerivation(e.to_string()))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        Version::V0x13,
        argon2_params,
    ))
}

/// Hashes proof material into a self-describing PHC string.
///
/// A fresh random salt is used per call, so hashing the same material twice
/// yields different strings; compare with [`verify_proof`], never with
/// string equality.
pub fn hash_proof(material: &ProofMaterial, params: &ProofParams) -> CryptoResult<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    let hash = argon2(params)?
        .hash_password(material.as_bytes(), &salt)
        .map_err(|e| CryptoError::ProofDerivation(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verifies proof material against a PHC string.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash itself
/// is malformed. The Argon2 verifier re-derives and compares internally,
/// so no raw hash equality check happens here.
pub fn verify_proof(material: &ProofMaterial, phc: &str) -> CryptoResult<bool> {
    let parsed = PasswordHash::new(phc).map_err(|e| CryptoError::MalformedHash(e.to_string()))?;
    match Argon2::default().verify_password(material.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::MalformedHash(e.to_string())),
    }
}

/// Generates a random session nonce: [`NONCE_BYTES`] bytes, base64-encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
