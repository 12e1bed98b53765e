//! Core types and cryptography for the trustchain ledger.
//!
//! A repository is an append-only chain of governance and contribution
//! blocks. Each block is chained to its predecessor by the SHA-256 hash of a
//! canonical serialization and endorsed by the enclave's signature over that
//! hash. This crate holds everything a party outside the enclave needs:
//! the block model, the RSA/SHA-256 primitives, the role rosters, the client
//! message formats, and a replaying chain verifier.

pub mod block;
pub mod crypto;
pub mod keyring;
pub mod messages;
pub mod verify;

mod types;

pub use block::{AccessBlock, Block, BlockHeader, CommitId, ContributionBlock, TrustTimestamp};
pub use crypto::{
    bytes_to_hex, generate_keypair, hex_to_bytes, CryptoError, Hash256, PrivateKey, PublicKey,
    Signature, ToHash256,
};
pub use keyring::{apply_role_change, KeyNotFound, KeyRing, RoleChange, RoleChangeError};
pub use messages::{AccessControlMessage, CommitMessage, LatestHashMessage};
pub use types::*;
