// Protocol - Message types exchanged inside a flow session
//
// Every frame on the wire is an Envelope: the session it belongs to, the
// sending party and one Message. Frames are postcard encoded.

use crate::contract::CommandKind;
use crate::identity::{Did, TransactionSignature};
use crate::transition::{SignedTransition, TransitionId};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest frame accepted from the wire
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Identifier tying the messages of one protocol run together
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId([u8; 16]);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..6]))
    }
}

/// Types of messages in the protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Proposal,
    SignatureReply,
    FetchTransactions,
    Transactions,
    Finalised,
    Abort,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Protocol errors
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Frame too large: {0} bytes")]
    MessageTooLarge(usize),
}

/// A partially signed transition sent to a required signer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proposal {
    /// The flow the requester is running; must match the transition's command
    pub kind: CommandKind,
    pub transition: SignedTransition,
}

/// Terminal answer to a proposal
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SignatureReply {
    Signed(TransactionSignature),
    Rejected(String),
}

/// Wrapper for all message types
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Message {
    Proposal(Proposal),
    SignatureReply(SignatureReply),
    /// Ask the requester for ancestor transitions
    FetchTransactions(Vec<TransitionId>),
    /// Answer to FetchTransactions; omits transitions the sender does not hold
    Transactions(Vec<SignedTransition>),
    /// The notarised transition, sent to every counterparty
    Finalised(SignedTransition),
    /// The initiator gave up; discard transient state
    Abort(String),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Proposal(_) => MessageType::Proposal,
            Message::SignatureReply(_) => MessageType::SignatureReply,
            Message::FetchTransactions(_) => MessageType::FetchTransactions,
            Message::Transactions(_) => MessageType::Transactions,
            Message::Finalised(_) => MessageType::Finalised,
            Message::Abort(_) => MessageType::Abort,
        }
    }
}

/// One frame on the wire
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub session: SessionId,
    pub sender: Did,
    pub message: Message,
}

impl Envelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let bytes =
            postcard::to_allocvec(self).map_err(|e| ProtocolError::SerializationFailed(e.to_string()))?;
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::MessageTooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::MessageTooLarge(bytes.len()));
        }
        postcard::from_bytes(bytes).map_err(|e| ProtocolError::DeserializationFailed(e.to_string()))
    }
}
