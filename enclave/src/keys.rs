//! The enclave key manager.
//!
//! A thin façade over a lazily materialized persistent keypair: every
//! operation opens the sealed object, generating and sealing a fresh
//! 2048-bit RSA keypair the first time. Creation is idempotent, so the
//! one-writer-then-many-readers discipline needs no locking beyond the
//! engine's own serialization.

use crate::sealed::{SealedStore, KEY_PAIR_OBJECT_ID};
use crate::Error;
use log::info;
use trustchain_core::{bytes_to_hex, hex_to_bytes, PrivateKey, PublicKey, Signature};

pub struct KeyManager<S: SealedStore> {
    store: S,
}

impl<S: SealedStore> KeyManager<S> {
    pub fn new(store: S) -> Self {
        KeyManager { store }
    }

    /// Opens the persistent keypair, generating and sealing one on first
    /// use.
    fn load_or_generate(&self) -> Result<PrivateKey, Error> {
        if let Some(sealed) = self.store.get(KEY_PAIR_OBJECT_ID)? {
            return unseal(&sealed);
        }
        let keypair = PrivateKey::generate()?;
        self.store
            .put(KEY_PAIR_OBJECT_ID, keypair.to_pkcs8_pem()?.as_bytes())?;
        info!("enclave keypair generated and sealed");
        // Re-open from the store so every caller reads the sealed copy.
        let sealed = self
            .store
            .get(KEY_PAIR_OBJECT_ID)?
            .ok_or_else(|| Error::CryptoFailure("sealed keypair vanished after create".into()))?;
        unseal(&sealed)
    }

    /// Hashes `data` with SHA-256 and signs the digest.
    pub fn sign_data(&self, data: &[u8]) -> Result<Signature, Error> {
        let keypair = self.load_or_generate()?;
        Ok(keypair.sign(data)?)
    }

    /// Signs an already-computed digest, given as 64 hex chars, without
    /// re-hashing.
    pub fn sign_hash(&self, hex_hash: &str) -> Result<Signature, Error> {
        let digest = hex_to_bytes(hex_hash).map_err(|e| Error::BadFormat(e.to_string()))?;
        if digest.len() != 32 {
            return Err(Error::BadFormat(format!(
                "expected a 32-byte digest, got {} bytes",
                digest.len()
            )));
        }
        let keypair = self.load_or_generate()?;
        Ok(keypair.sign_digest(&digest)?)
    }

    /// Verifies a signature against the enclave's own public key.
    pub fn verify_internal(&self, data: &[u8], signature: &Signature) -> Result<(), Error> {
        let keypair = self.load_or_generate()?;
        Ok(keypair.public_key()?.verify(data, signature)?)
    }

    /// RSAES-PKCS1-v1_5 decryption of one hex-encoded block; returns the
    /// plaintext as lowercase hex.
    pub fn decrypt(&self, ciphertext_hex: &str) -> Result<String, Error> {
        let ciphertext =
            hex_to_bytes(ciphertext_hex).map_err(|e| Error::BadFormat(e.to_string()))?;
        let keypair = self.load_or_generate()?;
        let plaintext = keypair.decrypt(&ciphertext)?;
        Ok(bytes_to_hex(plaintext))
    }

    /// The enclave public key as SubjectPublicKeyInfo PEM.
    pub fn public_key_pem(&self) -> Result<String, Error> {
        Ok(self.public_key()?.as_pem().to_owned())
    }

    pub fn public_key(&self) -> Result<PublicKey, Error> {
        let keypair = self.load_or_generate()?;
        Ok(keypair.public_key()?)
    }
}

fn unseal(sealed: &[u8]) -> Result<PrivateKey, Error> {
    let pem = std::str::from_utf8(sealed)
        .map_err(|_| Error::CryptoFailure("sealed keypair is not UTF-8".into()))?;
    PrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| Error::CryptoFailure(format!("sealed keypair unusable: {e}")))
}
