//! Cryptographic primitives shared by the enclave and its clients.
//!
//! Everything is RSA with PKCS#1 v1.5 padding and SHA-256 digests:
//! RSASSA-PKCS1-v1_5 for signatures, RSAES-PKCS1-v1_5 for the single-block
//! key transport used by commits. Public keys travel as SubjectPublicKeyInfo
//! PEM strings and roster membership compares those strings exactly, so a
//! key is always re-emitted byte-for-byte as it was admitted.

use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Modulus size of keys generated by this library.
pub const RSA_KEY_BITS: usize = 2048;
/// Smallest modulus accepted when parsing a foreign public key.
pub const MIN_RSA_KEY_BITS: usize = 2048;
/// Largest modulus accepted when parsing a foreign public key.
pub const MAX_RSA_KEY_BITS: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// When the data format is not valid (hex, PEM, digest length).
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// A syntactically valid key outside the supported parameter range.
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),
    #[error("verification failed")]
    VerificationFailed,
    /// The underlying primitive failed (key generation, signing, decryption).
    #[error("crypto backend: {0}")]
    Backend(String),
}

type Error = CryptoError;

/// Anything with a canonical serialization that identifies it on the chain.
pub trait ToHash256 {
    fn to_hash256(&self) -> Hash256;
}

/// Encodes bytes as lowercase hex.
pub fn bytes_to_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(bytes)
}

/// Decodes a hex string of either case. Rejects odd lengths and non-hex
/// characters.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, Error> {
    hex::decode(s).map_err(|e| Error::InvalidFormat(format!("hex: {e}")))
}

/// A SHA-256 digest.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Hash256 {
    bytes: [u8; 32],
}

impl Hash256 {
    /// The all-zero digest, used as the parent of a genesis block.
    pub const fn zero() -> Self {
        Hash256 { bytes: [0; 32] }
    }

    /// Hashes the given data.
    pub fn hash(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash256 {
            bytes: hasher.finalize().into(),
        }
    }

    pub const fn from_array(bytes: [u8; 32]) -> Self {
        Hash256 { bytes }
    }

    /// Parses a 64-hex-char digest of either case.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex_to_bytes(s)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidFormat(format!("expected 32-byte digest, got {s:?}")))?;
        Ok(Hash256 { bytes })
    }

    pub fn to_hex(&self) -> String {
        bytes_to_hex(self.bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An RSA signature, rendered as lowercase hex on the wire.
///
/// The empty signature is valid as data (a genesis block carries one) but
/// never verifies.
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    pub const fn empty() -> Self {
        Signature { bytes: Vec::new() }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Signature { bytes }
    }

    pub fn from_hex(s: &str) -> Result<Self, Error> {
        Ok(Signature {
            bytes: hex_to_bytes(s)?,
        })
    }

    pub fn to_hex(&self) -> String {
        bytes_to_hex(&self.bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A validated RSA public key, kept in its original PEM rendering.
///
/// Equality and hashing use the PEM string, matching the roster semantics:
/// the same key re-encoded differently is a different roster entry.
#[derive(Clone)]
pub struct PublicKey {
    pem: String,
    key: RsaPublicKey,
}

impl PublicKey {
    /// Parses a SubjectPublicKeyInfo PEM. The key must be RSA with a
    /// modulus between 2048 and 4096 bits.
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| Error::InvalidFormat(format!("public key pem: {e}")))?;
        let bits = key.size() * 8;
        if !(MIN_RSA_KEY_BITS..=MAX_RSA_KEY_BITS).contains(&bits) {
            return Err(Error::UnsupportedKey(format!(
                "RSA modulus must be {MIN_RSA_KEY_BITS}-{MAX_RSA_KEY_BITS} bits, got {bits}"
            )));
        }
        Ok(PublicKey {
            pem: pem.to_owned(),
            key,
        })
    }

    pub fn as_pem(&self) -> &str {
        &self.pem
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }

    /// Verifies an RSASSA-PKCS1-v1_5-SHA256 signature over `data`.
    pub fn verify(&self, data: impl AsRef<[u8]>, signature: &Signature) -> Result<(), Error> {
        let digest = Sha256::digest(data);
        self.verify_digest(&digest, signature)
    }

    /// Verifies a signature over an already-computed SHA-256 digest.
    pub fn verify_digest(&self, digest: &[u8], signature: &Signature) -> Result<(), Error> {
        self.key
            .verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature.as_ref())
            .map_err(|_| Error::VerificationFailed)
    }

    /// RSAES-PKCS1-v1_5 encryption of a single block of plaintext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.key
            .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, plaintext)
            .map_err(|e| Error::Backend(format!("encrypt: {e}")))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.pem == other.pem
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.pem.hash(state);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pem)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({} bits)", self.bits())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.pem)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_pem(&s).map_err(serde::de::Error::custom)
    }
}

/// An RSA private key.
pub struct PrivateKey {
    key: RsaPrivateKey,
}

impl PrivateKey {
    /// Generates a fresh 2048-bit key.
    pub fn generate() -> Result<Self, Error> {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
            .map_err(|e| Error::Backend(format!("keygen: {e}")))?;
        Ok(PrivateKey { key })
    }

    pub fn public_key(&self) -> Result<PublicKey, Error> {
        let pem = RsaPublicKey::from(&self.key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::Backend(format!("pem export: {e}")))?;
        PublicKey::from_pem(&pem)
    }

    /// Signs `data`: SHA-256 first, then RSASSA-PKCS1-v1_5 over the digest.
    pub fn sign(&self, data: impl AsRef<[u8]>) -> Result<Signature, Error> {
        let digest = Sha256::digest(data);
        self.sign_digest(&digest)
    }

    /// Signs an already-computed SHA-256 digest without re-hashing.
    pub fn sign_digest(&self, digest: &[u8]) -> Result<Signature, Error> {
        self.key
            .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
            .map(Signature::from_bytes)
            .map_err(|e| Error::Backend(format!("sign: {e}")))
    }

    /// RSAES-PKCS1-v1_5 decryption of exactly one block.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        self.key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| Error::Backend(format!("decrypt: {e}")))
    }

    /// PKCS#8 PEM rendering for sealed storage.
    pub fn to_pkcs8_pem(&self) -> Result<String, Error> {
        self.key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| Error::Backend(format!("pkcs8 export: {e}")))
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, Error> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map(|key| PrivateKey { key })
            .map_err(|e| Error::InvalidFormat(format!("private key pem: {e}")))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([redacted])")
    }
}

/// Generates a fresh 2048-bit keypair.
pub fn generate_keypair() -> Result<(PublicKey, PrivateKey), Error> {
    let private_key = PrivateKey::generate()?;
    let public_key = private_key.public_key()?;
    Ok((public_key, private_key))
}
