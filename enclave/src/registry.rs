//! The repository registry: a bounded table of dense repository ids.

use crate::Error;
use trustchain_core::{BlockHeight, Hash256, KeyRing, PublicKey, RepoId, MAX_REPO_ID};

/// Everything the engine tracks about one repository.
#[derive(Debug, Clone)]
pub struct Repository {
    pub repo_id: RepoId,
    /// 0 before genesis; incremented by exactly one per accepted block.
    pub block_height: BlockHeight,
    /// Hash of the block at `block_height`, or all zeroes before genesis.
    pub latest_hash: Hash256,
    /// The key that bootstrapped the repository. Immutable.
    pub founder_key: PublicKey,
    pub admin_keys: KeyRing,
    pub writer_keys: KeyRing,
}

impl Repository {
    /// A pre-genesis repository: zero head, the founder as sole admin.
    pub fn new(repo_id: RepoId, founder: PublicKey) -> Self {
        Repository {
            repo_id,
            block_height: 0,
            latest_hash: Hash256::zero(),
            admin_keys: [founder.clone()].into_iter().collect(),
            writer_keys: KeyRing::new(),
            founder_key: founder,
        }
    }
}

/// Repository ids are allocated densely starting at 0 and never reused;
/// deletion is not a supported operation.
#[derive(Debug, Default)]
pub struct Registry {
    repositories: Vec<Repository>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// The id the next insertion will take, or `OutOfCapacity`.
    pub fn next_id(&self) -> Result<RepoId, Error> {
        if self.repositories.len() >= MAX_REPO_ID as usize {
            return Err(Error::OutOfCapacity);
        }
        Ok(self.repositories.len() as RepoId)
    }

    /// Inserts a repository built for the id returned by [`Self::next_id`].
    pub fn insert(&mut self, repository: Repository) {
        debug_assert_eq!(repository.repo_id as usize, self.repositories.len());
        self.repositories.push(repository);
    }

    pub fn get(&self, repo_id: RepoId) -> Result<&Repository, Error> {
        self.repositories
            .get(repo_id as usize)
            .ok_or(Error::NotFound(repo_id))
    }

    pub fn get_mut(&mut self, repo_id: RepoId) -> Result<&mut Repository, Error> {
        self.repositories
            .get_mut(repo_id as usize)
            .ok_or(Error::NotFound(repo_id))
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
