//! Certificate fingerprinting.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 fingerprint of a certificate, hex-encoded.
///
/// Both sides of a handshake bind their proof to their own certificate
/// fingerprint; the verifier uses the fingerprint it already knows for the
/// peer, so a man-in-the-middle with the right secret but the wrong
/// certificate still fails.
pub fn cert_fingerprint(cert_der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cert_der);
    hex::encode(hasher.finalize())
}
