use driftsync_crypto::{
    cert_fingerprint, generate_nonce, hash_proof, verify_proof, ProofMaterial, ProofParams,
    NONCE_BYTES,
};
use base64::Engine;

#[test]
fn hash_and_verify_roundtrip() {
    let material = ProofMaterial::assemble("nonce", "fp", "secret");
    let phc = hash_proof(&material, &ProofParams::test()).unwrap();
    assert!(verify_proof(&material, &phc).unwrap());
}

#[test]
fn verify_rejects_wrong_secret() {
    let material = ProofMaterial::assemble("nonce", "fp", "secret");
    let phc = hash_proof(&material, &ProofParams::test()).unwrap();

    let wrong = ProofMaterial::assemble("nonce", "fp", "not-the-secret");
    assert!(!verify_proof(&wrong, &phc).unwrap());
}

#[test]
fn verify_rejects_wrong_fingerprint() {
    let material = ProofMaterial::assemble("nonce", "fp-a", "secret");
    let phc = hash_proof(&material, &ProofParams::test()).unwrap();

    let wrong = ProofMaterial::assemble("nonce", "fp-b", "secret");
    assert!(!verify_proof(&wrong, &phc).unwrap());
}

#[test]
fn hashes_are_salted() {
    let material = ProofMaterial::assemble("nonce", "fp", "secret");
    let a = hash_proof(&material, &ProofParams::test()).unwrap();
    let b = hash_proof(&material, &ProofParams::test()).unwrap();
    // Fresh salt per call; both still verify
    assert_ne!(a, b);
    assert!(verify_proof(&material, &a).unwrap());
    assert!(verify_proof(&material, &b).unwrap());
}

#[test]
fn verify_malformed_hash_is_an_error() {
    let material = ProofMaterial::assemble("nonce", "fp", "secret");
    assert!(verify_proof(&material, "not a phc string").is_err());
}

#[test]
fn nonce_has_declared_entropy() {
    let nonce = generate_nonce();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&nonce)
        .unwrap();
    assert_eq!(decoded.len(), NONCE_BYTES);
}

#[test]
fn nonces_are_unique() {
    assert_ne!(generate_nonce(), generate_nonce());
}

#[test]
fn fingerprint_is_stable_hex() {
    let a = cert_fingerprint(b"cert bytes");
    let b = cert_fingerprint(b"cert bytes");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn fingerprint_differs_per_cert() {
    assert_ne!(cert_fingerprint(b"cert a"), cert_fingerprint(b"cert b"));
}
