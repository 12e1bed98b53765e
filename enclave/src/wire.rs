//! The host-facing command surface.
//!
//! The engine is invoked through five integer opcodes. Opcode 1 once named
//! a repository-deletion command and has been withdrawn; it stays
//! unassigned so old hosts fail loudly instead of hitting a different
//! handler. This module also preserves the caller-buffer contract for
//! exporting the enclave public key: a too-small buffer yields
//! `ShortBuffer` carrying the required size, and the caller retries.

use crate::engine::TrustEngine;
use crate::sealed::SealedStore;
use crate::Error;

pub const CMD_INIT_REPO: u32 = 0;
pub const CMD_ACCESS_CONTROL: u32 = 2;
pub const CMD_GET_LATEST_HASH: u32 = 3;
pub const CMD_COMMIT: u32 = 4;
pub const CMD_GET_TEE_PUBKEY: u32 = 5;

/// A decoded command opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    InitRepo,
    AccessControl,
    GetLatestHash,
    Commit,
    GetTeePublicKey,
}

impl Command {
    pub fn from_opcode(opcode: u32) -> Result<Self, Error> {
        match opcode {
            CMD_INIT_REPO => Ok(Command::InitRepo),
            CMD_ACCESS_CONTROL => Ok(Command::AccessControl),
            CMD_GET_LATEST_HASH => Ok(Command::GetLatestHash),
            CMD_COMMIT => Ok(Command::Commit),
            CMD_GET_TEE_PUBKEY => Ok(Command::GetTeePublicKey),
            1 => Err(Error::BadParameters(
                "opcode 1 (repository deletion) is withdrawn".into(),
            )),
            other => Err(Error::BadParameters(format!("unknown opcode {other}"))),
        }
    }

    pub const fn opcode(self) -> u32 {
        match self {
            Command::InitRepo => CMD_INIT_REPO,
            Command::AccessControl => CMD_ACCESS_CONTROL,
            Command::GetLatestHash => CMD_GET_LATEST_HASH,
            Command::Commit => CMD_COMMIT,
            Command::GetTeePublicKey => CMD_GET_TEE_PUBKEY,
        }
    }
}

/// Copies the enclave public key PEM into a caller-provided buffer,
/// returning the number of bytes written.
pub fn copy_public_key_pem<S: SealedStore>(
    engine: &TrustEngine<S>,
    out: &mut [u8],
) -> Result<usize, Error> {
    let pem = engine.tee_public_key()?;
    let bytes = pem.as_bytes();
    if out.len() < bytes.len() {
        return Err(Error::ShortBuffer {
            required: bytes.len(),
        });
    }
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}
