use crate::identity::Did;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier linking successive versions of the same obligation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinearId([u8; 16]);

impl LinearId {
    /// Allocate a fresh random identifier
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

impl fmt::Display for LinearId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// One obligation of `value` from `sender` to `recipient`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IOUState {
    value: i64,
    sender: Did,
    recipient: Did,
    linear_id: LinearId,
}

impl IOUState {
    /// Create a state with an explicit linear id
    pub fn new(value: i64, sender: Did, recipient: Did, linear_id: LinearId) -> Self {
        Self {
            value,
            sender,
            recipient,
            linear_id,
        }
    }

    /// Create the first version of an obligation, allocating a new linear id
    pub fn issue(value: i64, sender: Did, recipient: Did) -> Self {
        Self::new(value, sender, recipient, LinearId::generate())
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn sender(&self) -> &Did {
        &self.sender
    }

    pub fn recipient(&self) -> &Did {
        &self.recipient
    }

    pub fn linear_id(&self) -> &LinearId {
        &self.linear_id
    }

    /// Parties whose signatures are mandatory to create or consume this state
    pub fn participants(&self) -> [&Did; 2] {
        [&self.sender, &self.recipient]
    }

    /// Whether `party` is a participant of this state
    pub fn is_relevant(&self, party: &Did) -> bool {
        self.participants().contains(&party)
    }

    /// Next version of this obligation, reassigned to a new recipient
    pub fn with_recipient(&self, recipient: Did) -> Self {
        Self {
            recipient,
            ..self.clone()
        }
    }

    pub(crate) fn write_signing_bytes(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.value.to_le_bytes());
        write_did(bytes, &self.sender);
        write_did(bytes, &self.recipient);
        bytes.extend_from_slice(&self.linear_id.0);
    }
}

pub(crate) fn write_did(bytes: &mut Vec<u8>, did: &Did) {
    let s = did.to_string();
    bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}
