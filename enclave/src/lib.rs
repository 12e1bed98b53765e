//! The trustchain trust engine.
//!
//! Everything that must run inside the trusted boundary lives here: the
//! sealed storage holding the enclave keypair, the key manager, the
//! repository registry, and the command handlers that validate, authorize,
//! build, hash and endorse every block. Handlers are transactional: all
//! validation and cryptography happen before any observable mutation, so a
//! failed call leaves the registry exactly as it was.
//!
//! The engine is single-threaded by design; a multithreaded host serializes
//! calls with one coarse mutex around the whole engine.

pub mod engine;
pub mod keys;
pub mod registry;
pub mod sealed;
pub mod wire;

use thiserror::Error;
use trustchain_core::{CryptoError, RepoId};

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input shape, unknown code, or an illegal state transition.
    #[error("bad parameters: {0}")]
    BadParameters(String),
    #[error("repository {0} not found")]
    NotFound(RepoId),
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// A client signature failed to verify.
    #[error("signature verification failed")]
    SecurityFailure,
    /// An underlying primitive or the sealed store failed.
    #[error("crypto failure: {0}")]
    CryptoFailure(String),
    #[error("repository registry is full")]
    OutOfCapacity,
    /// The caller's buffer cannot hold the output; retry with `required`
    /// bytes.
    #[error("output buffer too small, {required} bytes required")]
    ShortBuffer { required: usize },
    /// PEM or hex content failed to parse.
    #[error("bad format: {0}")]
    BadFormat(String),
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidFormat(msg) => Error::BadFormat(msg),
            CryptoError::UnsupportedKey(msg) => Error::BadParameters(msg),
            CryptoError::VerificationFailed => Error::SecurityFailure,
            CryptoError::Backend(msg) => Error::CryptoFailure(msg),
        }
    }
}

impl From<sealed::StoreError> for Error {
    fn from(e: sealed::StoreError) -> Self {
        Error::CryptoFailure(e.to_string())
    }
}

pub use engine::TrustEngine;
pub use keys::KeyManager;
pub use registry::{Registry, Repository};
pub use sealed::{DirectoryStore, MemoryStore, SealedStore, KEY_PAIR_OBJECT_ID};
