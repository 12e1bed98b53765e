//! Role rosters: owned collections of distinct public keys, and the
//! legality rules for moving keys between them.

use crate::crypto::PublicKey;
use crate::{Operation, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned by [`KeyRing::remove`] when the key is not in the ring.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("key not found in ring")]
pub struct KeyNotFound;

/// A set of distinct public keys with linear membership.
///
/// Rosters are small (a handful of admins and writers per repository), so a
/// scan beats hashing the PEM strings. Distinctness is the caller's concern:
/// handlers check membership before inserting.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct KeyRing {
    keys: Vec<PublicKey>,
}

impl KeyRing {
    pub fn new() -> Self {
        KeyRing::default()
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn insert(&mut self, key: PublicKey) {
        self.keys.push(key);
    }

    /// Removes the key, failing if it is absent.
    pub fn remove(&mut self, key: &PublicKey) -> Result<(), KeyNotFound> {
        if self.find_and_remove(key) {
            Ok(())
        } else {
            Err(KeyNotFound)
        }
    }

    /// Removes the key if present; reports whether it was there.
    pub fn find_and_remove(&mut self, key: &PublicKey) -> bool {
        match self.keys.iter().position(|k| k == key) {
            Some(index) => {
                self.keys.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter()
    }
}

impl FromIterator<PublicKey> for KeyRing {
    fn from_iter<I: IntoIterator<Item = PublicKey>>(iter: I) -> Self {
        KeyRing {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Why a roster change is illegal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChangeError {
    #[error("key already in admin list")]
    AlreadyAdmin,
    #[error("key already in writer list")]
    AlreadyWriter,
    #[error("admin keys already hold write access")]
    AdminHasWriteAccess,
    #[error("key not in admin list")]
    NotAnAdmin,
    #[error("key not in writer list")]
    NotAWriter,
    #[error("cannot remove the last admin")]
    LastAdmin,
    #[error("operation is not a roster change")]
    NotAccessOperation,
}

/// What a legal roster change did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Added,
    /// An ADD/ADMIN on a current writer: the key moved between rings.
    PromotedFromWriter,
    Removed,
}

/// Applies one roster transition, upholding the roster invariants: the two
/// rings stay disjoint and the admin ring never empties.
///
/// Both the enclave handlers and the third-party chain verifier route role
/// changes through here so the two can never disagree on legality.
pub fn apply_role_change(
    admins: &mut KeyRing,
    writers: &mut KeyRing,
    op: Operation,
    role: Role,
    subject: &PublicKey,
) -> Result<RoleChange, RoleChangeError> {
    match (op, role) {
        (Operation::Add, Role::Admin) => {
            if admins.contains(subject) {
                return Err(RoleChangeError::AlreadyAdmin);
            }
            let was_writer = writers.find_and_remove(subject);
            admins.insert(subject.clone());
            if was_writer {
                Ok(RoleChange::PromotedFromWriter)
            } else {
                Ok(RoleChange::Added)
            }
        }
        (Operation::Add, Role::Writer) => {
            if writers.contains(subject) {
                return Err(RoleChangeError::AlreadyWriter);
            }
            if admins.contains(subject) {
                return Err(RoleChangeError::AdminHasWriteAccess);
            }
            writers.insert(subject.clone());
            Ok(RoleChange::Added)
        }
        (Operation::Delete, Role::Admin) => {
            if admins.len() == 1 && admins.contains(subject) {
                return Err(RoleChangeError::LastAdmin);
            }
            admins
                .remove(subject)
                .map_err(|KeyNotFound| RoleChangeError::NotAnAdmin)?;
            Ok(RoleChange::Removed)
        }
        (Operation::Delete, Role::Writer) => {
            writers
                .remove(subject)
                .map_err(|KeyNotFound| RoleChangeError::NotAWriter)?;
            Ok(RoleChange::Removed)
        }
        _ => Err(RoleChangeError::NotAccessOperation),
    }
}
