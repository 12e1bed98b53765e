//! The block model and its canonical serialization.
//!
//! Every block shares a common header; the tail distinguishes access blocks
//! (role grants and revocations) from contribution blocks (pushes and
//! pull-request merges). A block's identity is the SHA-256 hash of its
//! canonical preimage: the header and tail fields joined by `:` with no
//! trailing newline. The enclave endorsement `tee_sig` signs that hash and
//! is therefore never part of the preimage.

use crate::crypto::{CryptoError, Hash256, PublicKey, Signature, ToHash256};
use crate::{BlockHeight, Operation, Role, MAX_HASH_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A wall-clock instant measured by the enclave when a block is built.
///
/// No monotonicity across blocks is promised.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct TrustTimestamp {
    pub seconds: u64,
    pub millis: u32,
}

impl TrustTimestamp {
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        TrustTimestamp {
            seconds: elapsed.as_secs(),
            millis: elapsed.subsec_millis(),
        }
    }
}

/// An external commit identifier: 64 hex characters, kept verbatim as
/// submitted since the canonical serialization includes it byte-for-byte.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(s: impl Into<String>) -> Result<Self, CryptoError> {
        let s = s.into();
        if s.len() != MAX_HASH_LENGTH || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CryptoError::InvalidFormat(format!(
                "commit id must be {MAX_HASH_LENGTH} hex chars, got {s:?}"
            )));
        }
        Ok(CommitId(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CommitId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CommitId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CommitId::new(s).map_err(serde::de::Error::custom)
    }
}

/// The fields common to every block.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct BlockHeader {
    /// The height of this block. The genesis block is at height 1.
    pub height: BlockHeight,
    /// The hash of the previous block, or all zeroes for genesis.
    pub parent_hash: Hash256,
    /// The operation this block records.
    pub op: Operation,
    /// The public key of the client that signed the triggering message.
    pub sigkey: PublicKey,
    /// The client's signature over the canonical message payload.
    /// Empty on the genesis block, which is attested by `tee_sig` alone.
    pub signature: Signature,
    /// When the enclave built this block.
    pub timestamp: TrustTimestamp,
}

impl BlockHeader {
    fn new(
        height: BlockHeight,
        parent_hash: Hash256,
        op: Operation,
        sigkey: PublicKey,
        signature: Signature,
    ) -> Self {
        BlockHeader {
            height,
            parent_hash,
            op,
            sigkey,
            signature,
            timestamp: TrustTimestamp::now(),
        }
    }

    /// The leading fields of the canonical preimage, shared by both block
    /// kinds.
    fn preimage_prefix(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.height,
            self.parent_hash,
            self.op.code(),
            self.sigkey.as_pem(),
            self.signature,
            self.timestamp.seconds,
            self.timestamp.millis,
        )
    }
}

/// A block recording a change to the repository roster.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct AccessBlock {
    pub header: BlockHeader,
    /// The role being granted or revoked.
    pub role: Role,
    /// The subject key the change applies to.
    pub pubkey: PublicKey,
    /// The enclave's signature over this block's canonical hash.
    pub tee_sig: Signature,
}

impl AccessBlock {
    pub fn new(
        height: BlockHeight,
        parent_hash: Hash256,
        op: Operation,
        role: Role,
        pubkey: PublicKey,
        sigkey: PublicKey,
        signature: Signature,
    ) -> Self {
        AccessBlock {
            header: BlockHeader::new(height, parent_hash, op, sigkey, signature),
            role,
            pubkey,
            tee_sig: Signature::empty(),
        }
    }

    /// The genesis block of a repository: the founder grants itself the
    /// admin role, self-attested by the enclave signature alone.
    pub fn genesis(founder: &PublicKey) -> Self {
        AccessBlock::new(
            1,
            Hash256::zero(),
            Operation::Add,
            Role::Admin,
            founder.clone(),
            founder.clone(),
            Signature::empty(),
        )
    }

    pub fn preimage(&self) -> String {
        format!(
            "{}:{}:{}",
            self.header.preimage_prefix(),
            self.role.code(),
            self.pubkey.as_pem(),
        )
    }
}

impl ToHash256 for AccessBlock {
    fn to_hash256(&self) -> Hash256 {
        Hash256::hash(self.preimage())
    }
}

/// A block recording a contribution commit.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ContributionBlock {
    pub header: BlockHeader,
    /// The external commit being recorded.
    pub commit_hash: CommitId,
    /// The enclave's signature over this block's canonical hash.
    pub tee_sig: Signature,
}

impl ContributionBlock {
    pub fn new(
        height: BlockHeight,
        parent_hash: Hash256,
        op: Operation,
        commit_hash: CommitId,
        sigkey: PublicKey,
        signature: Signature,
    ) -> Self {
        ContributionBlock {
            header: BlockHeader::new(height, parent_hash, op, sigkey, signature),
            commit_hash,
            tee_sig: Signature::empty(),
        }
    }

    pub fn preimage(&self) -> String {
        format!("{}:{}", self.header.preimage_prefix(), self.commit_hash)
    }
}

impl ToHash256 for ContributionBlock {
    fn to_hash256(&self) -> Hash256 {
        Hash256::hash(self.preimage())
    }
}

/// Either kind of block, as it appears in a chain.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub enum Block {
    Access(AccessBlock),
    Contribution(ContributionBlock),
}

impl Block {
    pub fn header(&self) -> &BlockHeader {
        match self {
            Block::Access(b) => &b.header,
            Block::Contribution(b) => &b.header,
        }
    }

    pub fn tee_sig(&self) -> &Signature {
        match self {
            Block::Access(b) => &b.tee_sig,
            Block::Contribution(b) => &b.tee_sig,
        }
    }
}

impl ToHash256 for Block {
    fn to_hash256(&self) -> Hash256 {
        match self {
            Block::Access(b) => b.to_hash256(),
            Block::Contribution(b) => b.to_hash256(),
        }
    }
}
