//! Client-facing command messages and their canonical signing payloads.
//!
//! A client authorizes a mutation by signing a colon-delimited payload with
//! its roster key; the enclave reconstructs the same payload and verifies
//! the signature before touching any state. Payload layouts are part of the
//! wire contract (operation and role as decimal codes, keys as PEM text).

use crate::block::CommitId;
use crate::crypto::{Hash256, PublicKey, Signature};
use crate::{Operation, RepoId, Role};
use serde::{Deserialize, Serialize};

/// Requests a roster change on a repository.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct AccessControlMessage {
    pub rep_id: RepoId,
    pub op: Operation,
    pub role: Role,
    /// The subject key being granted or revoked.
    pub pubkey: PublicKey,
    /// The admin key authorizing the change.
    pub sigkey: PublicKey,
    /// Signature by `sigkey` over [`Self::signing_payload`].
    pub signature: Signature,
}

impl AccessControlMessage {
    pub fn signing_payload(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.rep_id,
            self.op.code(),
            self.role.code(),
            self.pubkey.as_pem(),
        )
    }
}

/// Requests a contribution record on a repository.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct CommitMessage {
    pub rep_id: RepoId,
    pub op: Operation,
    pub commit_hash: CommitId,
    /// The admin or writer key authorizing the record.
    pub sigkey: PublicKey,
    /// Signature by `sigkey` over [`Self::signing_payload`].
    pub signature: Signature,
}

impl CommitMessage {
    pub fn signing_payload(&self) -> String {
        format!("{}:{}:{}", self.rep_id, self.op.code(), self.commit_hash)
    }
}

/// A signed, nonce-bound snapshot of a repository's chain head.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LatestHashMessage {
    /// Caller-chosen challenge echoed back to defeat replay.
    pub nonce: u32,
    pub latest_hash: Hash256,
}

impl LatestHashMessage {
    /// The bytes the enclave signs when returning this reply.
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        format!("{}:{}", self.nonce, self.latest_hash).into_bytes()
    }
}
