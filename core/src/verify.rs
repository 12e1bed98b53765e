//! Third-party verification of a repository chain.
//!
//! A verifier holds only the enclave's public key and the repository id; it
//! replays the block sequence from the zero head, enforcing linkage, client
//! authorization and the enclave endorsement at every step. If every block
//! is accepted, the verifier's head equals the repository's latest hash and
//! the replayed rosters equal the repository's rosters.

use crate::block::Block;
use crate::crypto::{CryptoError, Hash256, PublicKey, ToHash256};
use crate::keyring::{apply_role_change, KeyRing};
use crate::{BlockHeight, Operation, RepoId, Role};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("invalid block: {0}")]
    InvalidBlock(String),
    #[error("unauthorized block: {0}")]
    Unauthorized(String),
    #[error("crypto error: {0}: {1}")]
    Crypto(String, CryptoError),
}

/// A replaying chain verifier.
///
/// A rejected block leaves the verifier unchanged, so a caller may probe
/// candidate blocks against the same verifier state.
#[derive(Debug, Clone)]
pub struct ChainVerifier {
    repo_id: RepoId,
    enclave_key: PublicKey,
    head: Hash256,
    height: BlockHeight,
    admins: KeyRing,
    writers: KeyRing,
}

impl ChainVerifier {
    /// Starts at height 0 with the zero head and empty rosters, exactly the
    /// state a repository has before its genesis block.
    pub fn new(repo_id: RepoId, enclave_key: PublicKey) -> Self {
        ChainVerifier {
            repo_id,
            enclave_key,
            head: Hash256::zero(),
            height: 0,
            admins: KeyRing::new(),
            writers: KeyRing::new(),
        }
    }

    pub fn head(&self) -> Hash256 {
        self.head
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn admins(&self) -> &KeyRing {
        &self.admins
    }

    pub fn writers(&self) -> &KeyRing {
        &self.writers
    }

    /// Verifies `block` as the next block of the chain and advances.
    pub fn apply(&mut self, block: &Block) -> Result<(), VerifyError> {
        let header = block.header();
        if header.height != self.height + 1 {
            return Err(VerifyError::InvalidBlock(format!(
                "expected height {}, got {}",
                self.height + 1,
                header.height
            )));
        }
        if header.parent_hash != self.head {
            return Err(VerifyError::InvalidBlock(format!(
                "expected parent {}, got {}",
                self.head, header.parent_hash
            )));
        }

        let mut admins = self.admins.clone();
        let mut writers = self.writers.clone();
        match block {
            Block::Access(access) => {
                if !header.op.is_access() {
                    return Err(VerifyError::InvalidBlock(format!(
                        "operation code {} in an access block",
                        header.op.code()
                    )));
                }
                if header.height == 1 {
                    self.check_genesis(access)?;
                } else {
                    if !admins.contains(&header.sigkey) {
                        return Err(VerifyError::Unauthorized(
                            "access block signer is not an admin".to_owned(),
                        ));
                    }
                    let payload = format!(
                        "{}:{}:{}:{}",
                        self.repo_id,
                        header.op.code(),
                        access.role.code(),
                        access.pubkey.as_pem(),
                    );
                    header
                        .sigkey
                        .verify(payload, &header.signature)
                        .map_err(|e| VerifyError::Crypto("client signature".to_owned(), e))?;
                }
                apply_role_change(&mut admins, &mut writers, header.op, access.role, &access.pubkey)
                    .map_err(|e| VerifyError::InvalidBlock(e.to_string()))?;
            }
            Block::Contribution(contribution) => {
                if !header.op.is_contribution() {
                    return Err(VerifyError::InvalidBlock(format!(
                        "operation code {} in a contribution block",
                        header.op.code()
                    )));
                }
                if header.height == 1 {
                    return Err(VerifyError::InvalidBlock(
                        "genesis must be an access block".to_owned(),
                    ));
                }
                if !admins.contains(&header.sigkey) && !writers.contains(&header.sigkey) {
                    return Err(VerifyError::Unauthorized(
                        "contribution block signer is neither admin nor writer".to_owned(),
                    ));
                }
                let payload = format!(
                    "{}:{}:{}",
                    self.repo_id,
                    header.op.code(),
                    contribution.commit_hash,
                );
                header
                    .sigkey
                    .verify(payload, &header.signature)
                    .map_err(|e| VerifyError::Crypto("client signature".to_owned(), e))?;
            }
        }

        let new_head = block.to_hash256();
        self.enclave_key
            .verify_digest(new_head.as_ref(), block.tee_sig())
            .map_err(|e| VerifyError::Crypto("enclave endorsement".to_owned(), e))?;

        self.head = new_head;
        self.height += 1;
        self.admins = admins;
        self.writers = writers;
        Ok(())
    }

    fn check_genesis(&self, access: &crate::block::AccessBlock) -> Result<(), VerifyError> {
        let header = &access.header;
        if header.op != Operation::Add
            || access.role != Role::Admin
            || access.pubkey != header.sigkey
        {
            return Err(VerifyError::InvalidBlock(
                "genesis must self-grant the admin role".to_owned(),
            ));
        }
        if !header.signature.is_empty() {
            return Err(VerifyError::InvalidBlock(
                "genesis carries no client signature".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{AccessBlock, CommitId, ContributionBlock};
    use crate::crypto::{generate_keypair, PrivateKey};
    use trustchain_test_suite::setup_test;

    const REPO: RepoId = 0;

    struct TestEnclave {
        public_key: PublicKey,
        private_key: PrivateKey,
    }

    impl TestEnclave {
        fn new() -> Self {
            let (public_key, private_key) = generate_keypair().unwrap();
            TestEnclave {
                public_key,
                private_key,
            }
        }

        fn endorse_access(&self, mut block: AccessBlock) -> AccessBlock {
            let hash = block.to_hash256();
            block.tee_sig = self.private_key.sign_digest(hash.as_ref()).unwrap();
            block
        }

        fn endorse_contribution(&self, mut block: ContributionBlock) -> ContributionBlock {
            let hash = block.to_hash256();
            block.tee_sig = self.private_key.sign_digest(hash.as_ref()).unwrap();
            block
        }
    }

    fn signed_access(
        enclave: &TestEnclave,
        height: u64,
        parent: Hash256,
        op: Operation,
        role: Role,
        subject: &PublicKey,
        signer: &PublicKey,
        signer_key: &PrivateKey,
    ) -> Block {
        let payload = format!("{REPO}:{}:{}:{}", op.code(), role.code(), subject.as_pem());
        let signature = signer_key.sign(payload).unwrap();
        let block = AccessBlock::new(
            height,
            parent,
            op,
            role,
            subject.clone(),
            signer.clone(),
            signature,
        );
        Block::Access(enclave.endorse_access(block))
    }

    fn signed_contribution(
        enclave: &TestEnclave,
        height: u64,
        parent: Hash256,
        op: Operation,
        commit: &CommitId,
        signer: &PublicKey,
        signer_key: &PrivateKey,
    ) -> Block {
        let payload = format!("{REPO}:{}:{commit}", op.code());
        let signature = signer_key.sign(payload).unwrap();
        let block = ContributionBlock::new(
            height,
            parent,
            op,
            commit.clone(),
            signer.clone(),
            signature,
        );
        Block::Contribution(enclave.endorse_contribution(block))
    }

    #[test]
    fn replays_a_well_formed_chain() {
        setup_test();
        let enclave = TestEnclave::new();
        let (admin, admin_key) = generate_keypair().unwrap();
        let (writer, writer_key) = generate_keypair().unwrap();
        let mut verifier = ChainVerifier::new(REPO, enclave.public_key.clone());

        let genesis = Block::Access(enclave.endorse_access(AccessBlock::genesis(&admin)));
        verifier.apply(&genesis).unwrap();
        assert_eq!(verifier.height(), 1);
        assert_eq!(verifier.head(), genesis.to_hash256());
        assert!(verifier.admins().contains(&admin));

        let add_writer = signed_access(
            &enclave,
            2,
            verifier.head(),
            Operation::Add,
            Role::Writer,
            &writer,
            &admin,
            &admin_key,
        );
        verifier.apply(&add_writer).unwrap();
        assert!(verifier.writers().contains(&writer));

        let commit = CommitId::new("ef".repeat(32)).unwrap();
        let push = signed_contribution(
            &enclave,
            3,
            verifier.head(),
            Operation::Push,
            &commit,
            &writer,
            &writer_key,
        );
        verifier.apply(&push).unwrap();
        assert_eq!(verifier.height(), 3);
        assert_eq!(verifier.head(), push.to_hash256());
    }

    #[test]
    fn rejects_height_and_parent_mismatch() {
        let enclave = TestEnclave::new();
        let (admin, _) = generate_keypair().unwrap();
        let mut verifier = ChainVerifier::new(REPO, enclave.public_key.clone());
        let genesis = Block::Access(enclave.endorse_access(AccessBlock::genesis(&admin)));
        verifier.apply(&genesis).unwrap();

        // Re-applying the same block fails the height check.
        assert!(matches!(
            verifier.apply(&genesis),
            Err(VerifyError::InvalidBlock(_))
        ));
        assert_eq!(verifier.height(), 1);

        // A block with the right height but a foreign parent fails linkage.
        let mut orphan = AccessBlock::genesis(&admin);
        orphan.header.height = 2;
        orphan.header.parent_hash = Hash256::hash("somewhere else");
        let orphan = Block::Access(enclave.endorse_access(orphan));
        assert!(matches!(
            verifier.apply(&orphan),
            Err(VerifyError::InvalidBlock(_))
        ));
    }

    #[test]
    fn rejects_forged_endorsement() {
        setup_test();
        let enclave = TestEnclave::new();
        let rogue = TestEnclave::new();
        let (admin, _) = generate_keypair().unwrap();
        let mut verifier = ChainVerifier::new(REPO, enclave.public_key.clone());

        let forged = Block::Access(rogue.endorse_access(AccessBlock::genesis(&admin)));
        assert!(matches!(
            verifier.apply(&forged),
            Err(VerifyError::Crypto(_, _))
        ));
        assert_eq!(verifier.height(), 0);
    }

    #[test]
    fn rejects_unauthorized_signers() {
        let enclave = TestEnclave::new();
        let (admin, _) = generate_keypair().unwrap();
        let (outsider, outsider_key) = generate_keypair().unwrap();
        let mut verifier = ChainVerifier::new(REPO, enclave.public_key.clone());
        let genesis = Block::Access(enclave.endorse_access(AccessBlock::genesis(&admin)));
        verifier.apply(&genesis).unwrap();

        // An outsider signing an access block is not an admin.
        let access = signed_access(
            &enclave,
            2,
            verifier.head(),
            Operation::Add,
            Role::Writer,
            &outsider,
            &outsider,
            &outsider_key,
        );
        assert!(matches!(
            verifier.apply(&access),
            Err(VerifyError::Unauthorized(_))
        ));

        // An outsider signing a contribution is neither admin nor writer.
        let commit = CommitId::new("ab".repeat(32)).unwrap();
        let push = signed_contribution(
            &enclave,
            2,
            verifier.head(),
            Operation::Push,
            &commit,
            &outsider,
            &outsider_key,
        );
        assert!(matches!(
            verifier.apply(&push),
            Err(VerifyError::Unauthorized(_))
        ));
        assert_eq!(verifier.height(), 1);
    }

    #[test]
    fn rejects_bad_client_signature() {
        let enclave = TestEnclave::new();
        let (admin, admin_key) = generate_keypair().unwrap();
        let (subject, _) = generate_keypair().unwrap();
        let mut verifier = ChainVerifier::new(REPO, enclave.public_key.clone());
        let genesis = Block::Access(enclave.endorse_access(AccessBlock::genesis(&admin)));
        verifier.apply(&genesis).unwrap();

        // Signature over the wrong payload.
        let signature = admin_key.sign("not the canonical payload").unwrap();
        let block = AccessBlock::new(
            2,
            verifier.head(),
            Operation::Add,
            Role::Writer,
            subject,
            admin,
            signature,
        );
        let block = Block::Access(enclave.endorse_access(block));
        assert!(matches!(
            verifier.apply(&block),
            Err(VerifyError::Crypto(_, CryptoError::VerificationFailed))
        ));
    }

    #[test]
    fn rejects_removing_the_last_admin() {
        let enclave = TestEnclave::new();
        let (admin, admin_key) = generate_keypair().unwrap();
        let mut verifier = ChainVerifier::new(REPO, enclave.public_key.clone());
        let genesis = Block::Access(enclave.endorse_access(AccessBlock::genesis(&admin)));
        verifier.apply(&genesis).unwrap();

        let delete_self = signed_access(
            &enclave,
            2,
            verifier.head(),
            Operation::Delete,
            Role::Admin,
            &admin,
            &admin,
            &admin_key,
        );
        assert!(matches!(
            verifier.apply(&delete_self),
            Err(VerifyError::InvalidBlock(_))
        ));
        assert!(verifier.admins().contains(&admin));
    }

    #[test]
    fn rejects_contribution_genesis() {
        let enclave = TestEnclave::new();
        let (writer, writer_key) = generate_keypair().unwrap();
        let mut verifier = ChainVerifier::new(REPO, enclave.public_key.clone());
        let commit = CommitId::new("01".repeat(32)).unwrap();
        let push = signed_contribution(
            &enclave,
            1,
            Hash256::zero(),
            Operation::Push,
            &commit,
            &writer,
            &writer_key,
        );
        assert!(matches!(
            verifier.apply(&push),
            Err(VerifyError::InvalidBlock(_))
        ));
    }
}
