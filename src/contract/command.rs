use crate::identity::Did;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Intent of a transition, carrying the keys that must sign it
///
/// The signer list is the single source of truth shared by the contract
/// validator, the signature collector and the notary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Create { signers: Vec<Did> },
    Transfer { signers: Vec<Did> },
}

/// Command tag without payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Create,
    Transfer,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Create { .. } => CommandKind::Create,
            Command::Transfer { .. } => CommandKind::Transfer,
        }
    }

    /// Required signers, excluding the notary
    pub fn signers(&self) -> &[Did] {
        match self {
            Command::Create { signers } | Command::Transfer { signers } => signers,
        }
    }

    pub(crate) fn write_signing_bytes(&self, bytes: &mut Vec<u8>) {
        bytes.push(match self.kind() {
            CommandKind::Create => 0,
            CommandKind::Transfer => 1,
        });
        let signers = self.signers();
        bytes.extend_from_slice(&(signers.len() as u32).to_le_bytes());
        for signer in signers {
            super::state::write_did(bytes, signer);
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Create => write!(f, "create"),
            CommandKind::Transfer => write!(f, "transfer"),
        }
    }
}
