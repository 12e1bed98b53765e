//! Identifiers, operation codes and wire-level constants.

use serde::{Deserialize, Serialize};

/// A dense repository identifier assigned by the registry.
pub type RepoId = u32;
/// A block height. A repository is at height 0 before its genesis block.
pub type BlockHeight = u64;

/// Upper bound on the number of repositories a single enclave serves.
pub const MAX_REPO_ID: u32 = 1000;
/// Maximum length of a PEM-encoded public key on the wire.
///
/// An RSA-2048 SubjectPublicKeyInfo PEM is roughly 450 bytes.
pub const MAX_KEY_LENGTH: usize = 512;
/// Length of a hash rendered as lowercase hex.
pub const MAX_HASH_LENGTH: usize = 64;
/// Maximum length of a hex-rendered RSA signature (RSA-4096).
pub const MAX_SIGNATURE_LENGTH: usize = 512;
/// Maximum length of a branch annotation accepted by the gateway.
pub const MAX_BRANCH_LENGTH: usize = 128;

/// The operation a block records.
///
/// The numeric codes are part of the wire contract and of the canonical
/// block serialization, so they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Grant a role (access block).
    Add,
    /// Revoke a role (access block).
    Delete,
    /// Record a direct push (contribution block).
    Push,
    /// Record a pull-request merge (contribution block).
    Pr,
}

impl Operation {
    pub const fn code(self) -> u32 {
        match self {
            Operation::Add => 0,
            Operation::Delete => 1,
            Operation::Push => 2,
            Operation::Pr => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Operation::Add),
            1 => Some(Operation::Delete),
            2 => Some(Operation::Push),
            3 => Some(Operation::Pr),
            _ => None,
        }
    }

    /// Whether this operation belongs in an access block.
    pub fn is_access(self) -> bool {
        matches!(self, Operation::Add | Operation::Delete)
    }

    /// Whether this operation belongs in a contribution block.
    pub fn is_contribution(self) -> bool {
        matches!(self, Operation::Push | Operation::Pr)
    }
}

impl Serialize for Operation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u32::deserialize(deserializer)?;
        Operation::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown operation code: {code}")))
    }
}

/// The role a subject key holds in a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Writer,
}

impl Role {
    pub const fn code(self) -> u32 {
        match self {
            Role::Admin => 1,
            Role::Writer => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Role::Admin),
            2 => Some(Role::Writer),
            _ => None,
        }
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u32::deserialize(deserializer)?;
        Role::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown role code: {code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_codes_round_trip() {
        for op in [
            Operation::Add,
            Operation::Delete,
            Operation::Push,
            Operation::Pr,
        ] {
            assert_eq!(Operation::from_code(op.code()), Some(op));
        }
        assert_eq!(Operation::from_code(4), None);
    }

    #[test]
    fn role_codes_round_trip() {
        assert_eq!(Role::from_code(1), Some(Role::Admin));
        assert_eq!(Role::from_code(2), Some(Role::Writer));
        assert_eq!(Role::from_code(0), None);
        assert_eq!(Role::from_code(3), None);
    }

    #[test]
    fn operation_kind_split() {
        assert!(Operation::Add.is_access());
        assert!(Operation::Delete.is_access());
        assert!(!Operation::Push.is_access());
        assert!(Operation::Push.is_contribution());
        assert!(Operation::Pr.is_contribution());
        assert!(!Operation::Delete.is_contribution());
    }

    #[test]
    fn serde_encodes_codes() {
        assert_eq!(serde_json::to_string(&Operation::Push).unwrap(), "2");
        assert_eq!(serde_json::to_string(&Role::Writer).unwrap(), "2");
        let op: Operation = serde_json::from_str("1").unwrap();
        assert_eq!(op, Operation::Delete);
        assert!(serde_json::from_str::<Operation>("9").is_err());
        assert!(serde_json::from_str::<Role>("0").is_err());
    }
}
