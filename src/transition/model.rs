use crate::contract::{Command, IOUContract, IOUState, ValidationResult};
use crate::identity::Did;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ID_DOMAIN: &[u8] = b"iou-ledger:transition:v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Resolved inputs do not match the transition's state references")]
    InputMismatch,

    #[error("Invalid state reference: {0}")]
    InvalidStateRef(String),
}

/// Unique identifier for a transition (SHA-256 of its contents)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId([u8; 32]);

impl TransitionId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TransitionError> {
        let bytes = hex::decode(s).map_err(|e| TransitionError::InvalidStateRef(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TransitionError::InvalidStateRef("transition id must be 32 bytes".into()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Pointer to one output of a prior transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    pub txid: TransitionId,
    pub index: u32,
}

impl StateRef {
    pub fn new(txid: TransitionId, index: u32) -> Self {
        Self { txid, index }
    }

    /// Fixed-width key form used by storage and the notary
    pub fn to_key(&self) -> [u8; 36] {
        let mut key = [0u8; 36];
        key[..32].copy_from_slice(&self.txid.0);
        key[32..].copy_from_slice(&self.index.to_be_bytes());
        key
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid.to_hex(), self.index)
    }
}

impl FromStr for StateRef {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s
            .split_once(':')
            .ok_or_else(|| TransitionError::InvalidStateRef(format!("expected <txid>:<index>, got '{s}'")))?;
        let index = index
            .parse::<u32>()
            .map_err(|e| TransitionError::InvalidStateRef(e.to_string()))?;
        Ok(Self::new(TransitionId::from_hex(txid)?, index))
    }
}

/// A state together with the reference that produced it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: IOUState,
    pub reference: StateRef,
}

/// A proposed ledger transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    inputs: Vec<StateRef>,
    outputs: Vec<IOUState>,
    command: Command,
    notary: Did,
}

impl Transition {
    pub fn new(inputs: Vec<StateRef>, outputs: Vec<IOUState>, command: Command, notary: Did) -> Self {
        Self {
            inputs,
            outputs,
            command,
            notary,
        }
    }

    pub fn inputs(&self) -> &[StateRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[IOUState] {
        &self.outputs
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn notary(&self) -> &Did {
        &self.notary
    }

    /// References to every output this transition produces
    pub fn output_refs(&self) -> Vec<StateAndRef> {
        let txid = self.id();
        self.outputs
            .iter()
            .enumerate()
            .map(|(i, state)| StateAndRef {
                state: state.clone(),
                reference: StateRef::new(txid, i as u32),
            })
            .collect()
    }

    /// Compute the transition id
    pub fn id(&self) -> TransitionId {
        let hash = Sha256::digest(self.to_signing_bytes());
        let mut id = [0u8; 32];
        id.copy_from_slice(&hash);
        TransitionId(id)
    }

    /// Deterministic, length-prefixed encoding of every field
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(256);
        bytes.extend_from_slice(ID_DOMAIN);

        bytes.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            bytes.extend_from_slice(&input.to_key());
        }

        bytes.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            output.write_signing_bytes(&mut bytes);
        }

        self.command.write_signing_bytes(&mut bytes);
        crate::contract::write_did(&mut bytes, &self.notary);
        bytes
    }

    /// Pair this transition with its resolved input states
    pub fn resolve(&self, inputs: Vec<StateAndRef>) -> Result<LedgerTransition, TransitionError> {
        let matches = inputs.len() == self.inputs.len()
            && inputs.iter().zip(&self.inputs).all(|(resolved, r)| &resolved.reference == r);
        if !matches {
            return Err(TransitionError::InputMismatch);
        }
        Ok(LedgerTransition {
            id: self.id(),
            inputs,
            outputs: self.outputs.clone(),
            command: self.command.clone(),
            notary: self.notary.clone(),
        })
    }
}

/// A transition whose inputs have been looked up, ready for contract checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerTransition {
    pub id: TransitionId,
    pub inputs: Vec<StateAndRef>,
    pub outputs: Vec<IOUState>,
    pub command: Command,
    pub notary: Did,
}

impl LedgerTransition {
    pub fn input_states(&self) -> Vec<IOUState> {
        self.inputs.iter().map(|i| i.state.clone()).collect()
    }

    /// Run the IOU contract
    pub fn verify(&self) -> ValidationResult {
        IOUContract::verify(&self.input_states(), &self.outputs, &self.command)
    }
}
