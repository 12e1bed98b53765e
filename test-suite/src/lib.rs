//! Shared helpers for trustchain tests.
//!
//! Tests play the role of the untrusted client: they hold roster private
//! keys, sign the canonical command payloads, and encrypt key material for
//! the enclave. The helpers here keep that client-side choreography out of
//! the test bodies.

use trustchain_core::*;

pub fn setup_test() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        env_logger::init();
        color_eyre::install().unwrap();
    });
}

/// Generates a fresh RSA-2048 keypair, panicking on backend failure.
pub fn test_keypair() -> (PublicKey, PrivateKey) {
    generate_keypair().expect("keypair generation")
}

/// Generates `n` distinct keypairs.
pub fn test_keypairs(n: usize) -> Vec<(PublicKey, PrivateKey)> {
    (0..n).map(|_| test_keypair()).collect()
}

/// Builds a fully signed roster-change message, as an admin client would.
pub fn access_control_message(
    rep_id: RepoId,
    op: Operation,
    role: Role,
    subject: &PublicKey,
    signer: &PublicKey,
    signer_key: &PrivateKey,
) -> AccessControlMessage {
    let payload = format!(
        "{rep_id}:{}:{}:{}",
        op.code(),
        role.code(),
        subject.as_pem()
    );
    AccessControlMessage {
        rep_id,
        op,
        role,
        pubkey: subject.clone(),
        sigkey: signer.clone(),
        signature: signer_key.sign(payload).expect("signing"),
    }
}

/// Builds a fully signed contribution message, as a writer client would.
pub fn commit_message(
    rep_id: RepoId,
    op: Operation,
    commit_hash: &CommitId,
    signer: &PublicKey,
    signer_key: &PrivateKey,
) -> CommitMessage {
    let payload = format!("{rep_id}:{}:{commit_hash}", op.code());
    CommitMessage {
        rep_id,
        op,
        commit_hash: commit_hash.clone(),
        sigkey: signer.clone(),
        signature: signer_key.sign(payload).expect("signing"),
    }
}

/// A commit identifier derived from a short label.
pub fn test_commit_id(label: &str) -> CommitId {
    CommitId::new(Hash256::hash(label).to_hex()).expect("hash hex is a valid commit id")
}

/// Encrypts `plaintext` for the enclave, returning lowercase hex ciphertext
/// as submitted with a commit.
pub fn encrypt_for_enclave(enclave_pem: &str, plaintext: &[u8]) -> String {
    let enclave_key = PublicKey::from_pem(enclave_pem).expect("enclave public key");
    bytes_to_hex(enclave_key.encrypt(plaintext).expect("encryption"))
}
