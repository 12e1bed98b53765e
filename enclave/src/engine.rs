//! The command handlers.
//!
//! Each handler is one transactional step: validate the message shape,
//! resolve the repository, check the signer's role, verify the client
//! signature over the canonical payload, compute the roster transition on
//! scratch rings, build and hash the block, obtain the enclave endorsement,
//! and only then commit `(rosters, latest_hash, block_height)` in one move.
//! Any failure before that last step leaves the repository untouched.

use crate::keys::KeyManager;
use crate::registry::{Registry, Repository};
use crate::sealed::SealedStore;
use crate::Error;
use log::{info, warn};
use trustchain_core::{
    apply_role_change, AccessBlock, AccessControlMessage, CommitMessage, ContributionBlock,
    LatestHashMessage, PublicKey, RepoId, RoleChange, Signature, ToHash256,
};

pub struct TrustEngine<S: SealedStore> {
    registry: Registry,
    keys: KeyManager<S>,
}

impl<S: SealedStore> TrustEngine<S> {
    pub fn new(store: S) -> Self {
        TrustEngine {
            registry: Registry::new(),
            keys: KeyManager::new(store),
        }
    }

    /// Creates a repository governed by `admin_key_pem` and returns its id
    /// and endorsed genesis block.
    pub fn init_repo(&mut self, admin_key_pem: &str) -> Result<(RepoId, AccessBlock), Error> {
        let founder = PublicKey::from_pem(admin_key_pem)?;
        let repo_id = self.registry.next_id()?;

        let mut repository = Repository::new(repo_id, founder.clone());
        let mut genesis = AccessBlock::genesis(&founder);
        let hash = genesis.to_hash256();
        genesis.tee_sig = self.keys.sign_hash(&hash.to_hex())?;

        repository.latest_hash = hash;
        repository.block_height = 1;
        // The slot is taken only now; earlier failures roll back for free.
        self.registry.insert(repository);
        info!("repository {repo_id} initialized, genesis hash {hash}");
        Ok((repo_id, genesis))
    }

    /// Applies a roster change and returns the endorsed access block.
    pub fn access_control(
        &mut self,
        message: &AccessControlMessage,
    ) -> Result<AccessBlock, Error> {
        if !message.op.is_access() {
            return Err(Error::BadParameters(format!(
                "operation {} is not a roster change, only ADD and DELETE",
                message.op.code()
            )));
        }
        let repo = self.registry.get(message.rep_id)?;
        if !repo.admin_keys.contains(&message.sigkey) {
            warn!(
                "repository {}: roster change denied, signer is not an admin",
                message.rep_id
            );
            return Err(Error::AccessDenied("signer is not an admin".into()));
        }
        message
            .sigkey
            .verify(message.signing_payload(), &message.signature)
            .map_err(|_| Error::SecurityFailure)?;

        let mut admin_keys = repo.admin_keys.clone();
        let mut writer_keys = repo.writer_keys.clone();
        let change = apply_role_change(
            &mut admin_keys,
            &mut writer_keys,
            message.op,
            message.role,
            &message.pubkey,
        )
        .map_err(|e| Error::BadParameters(e.to_string()))?;
        if change == RoleChange::PromotedFromWriter {
            info!("repository {}: writer promoted to admin", message.rep_id);
        }

        let mut block = AccessBlock::new(
            repo.block_height + 1,
            repo.latest_hash,
            message.op,
            message.role,
            message.pubkey.clone(),
            message.sigkey.clone(),
            message.signature.clone(),
        );
        let hash = block.to_hash256();
        block.tee_sig = self.keys.sign_hash(&hash.to_hex())?;

        let repo = self.registry.get_mut(message.rep_id)?;
        repo.admin_keys = admin_keys;
        repo.writer_keys = writer_keys;
        repo.latest_hash = hash;
        repo.block_height += 1;
        info!(
            "repository {}: access block {} accepted",
            message.rep_id, repo.block_height
        );
        Ok(block)
    }

    /// Records a contribution and returns the endorsed block together with
    /// the decrypted key material, as lowercase hex.
    pub fn commit(
        &mut self,
        message: &CommitMessage,
        encrypted_key: &str,
    ) -> Result<(ContributionBlock, String), Error> {
        if !message.op.is_contribution() {
            return Err(Error::BadParameters(format!(
                "operation {} is not a contribution, only PUSH and PR",
                message.op.code()
            )));
        }
        let repo = self.registry.get(message.rep_id)?;
        if !repo.admin_keys.contains(&message.sigkey)
            && !repo.writer_keys.contains(&message.sigkey)
        {
            warn!(
                "repository {}: commit denied, signer is neither admin nor writer",
                message.rep_id
            );
            return Err(Error::AccessDenied(
                "signer is neither admin nor writer".into(),
            ));
        }
        message
            .sigkey
            .verify(message.signing_payload(), &message.signature)
            .map_err(|_| Error::SecurityFailure)?;

        let mut block = ContributionBlock::new(
            repo.block_height + 1,
            repo.latest_hash,
            message.op,
            message.commit_hash.clone(),
            message.sigkey.clone(),
            message.signature.clone(),
        );
        let hash = block.to_hash256();
        block.tee_sig = self.keys.sign_hash(&hash.to_hex())?;

        // Decryption must succeed before any state advances.
        let decrypted_key = self.keys.decrypt(encrypted_key)?;

        let repo = self.registry.get_mut(message.rep_id)?;
        repo.latest_hash = hash;
        repo.block_height += 1;
        info!(
            "repository {}: contribution block {} accepted, commit {}",
            message.rep_id, repo.block_height, message.commit_hash
        );
        Ok((block, decrypted_key))
    }

    /// A signed snapshot of the chain head, bound to the caller's nonce.
    pub fn latest_hash(
        &self,
        rep_id: RepoId,
        nonce: u32,
    ) -> Result<(LatestHashMessage, Signature), Error> {
        let repo = self.registry.get(rep_id)?;
        let message = LatestHashMessage {
            nonce,
            latest_hash: repo.latest_hash,
        };
        let signature = self.keys.sign_data(&message.to_signing_bytes())?;
        Ok((message, signature))
    }

    /// The enclave public key as SubjectPublicKeyInfo PEM.
    pub fn tee_public_key(&self) -> Result<String, Error> {
        self.keys.public_key_pem()
    }

    pub fn repository(&self, rep_id: RepoId) -> Result<&Repository, Error> {
        self.registry.get(rep_id)
    }

    pub fn repository_count(&self) -> usize {
        self.registry.len()
    }

    pub fn key_manager(&self) -> &KeyManager<S> {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sealed::MemoryStore;
    use trustchain_core::Hash256;
    use trustchain_test_suite::{setup_test, test_keypair};

    #[test]
    fn init_repo_allocates_dense_ids() {
        setup_test();
        let mut engine = TrustEngine::new(MemoryStore::new());
        let (a, _) = test_keypair();
        let (b, _) = test_keypair();

        let (first, _) = engine.init_repo(a.as_pem()).unwrap();
        let (second, _) = engine.init_repo(b.as_pem()).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(engine.repository_count(), 2);
    }

    #[test]
    fn init_repo_rejects_malformed_keys() {
        let mut engine = TrustEngine::new(MemoryStore::new());
        assert!(matches!(
            engine.init_repo("not a pem"),
            Err(Error::BadFormat(_))
        ));
        assert_eq!(engine.repository_count(), 0);
    }

    #[test]
    fn unknown_repository_is_not_found() {
        let engine = TrustEngine::new(MemoryStore::new());
        assert!(matches!(
            engine.latest_hash(3, 0),
            Err(Error::NotFound(3))
        ));
        assert!(matches!(engine.repository(0), Err(Error::NotFound(0))));
    }

    #[test]
    fn latest_hash_binds_nonce() {
        let mut engine = TrustEngine::new(MemoryStore::new());
        let (founder, _) = test_keypair();
        let (repo_id, genesis) = engine.init_repo(founder.as_pem()).unwrap();

        let (first, first_sig) = engine.latest_hash(repo_id, 1).unwrap();
        let (second, second_sig) = engine.latest_hash(repo_id, 2).unwrap();
        assert_eq!(first.latest_hash, genesis.to_hash256());
        assert_eq!(first.latest_hash, second.latest_hash);
        assert_ne!(first_sig, second_sig);

        let enclave_key = engine.key_manager().public_key().unwrap();
        enclave_key
            .verify(first.to_signing_bytes(), &first_sig)
            .unwrap();
        enclave_key
            .verify(second.to_signing_bytes(), &second_sig)
            .unwrap();
        assert_ne!(first.latest_hash, Hash256::zero());
    }
}
