use crate::identity::{KeypairError, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DID_SCHEME: &str = "did";
const DID_METHOD: &str = "iou";

#[derive(Error, Debug)]
pub enum DidError {
    #[error("Invalid DID format: {0}")]
    InvalidFormat(String),

    #[error("Invalid DID method: expected 'iou', got '{0}'")]
    InvalidMethod(String),

    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(#[from] KeypairError),
}

/// Identity of a ledger party: `did:iou:<base58 public key>`
///
/// The key is embedded in the identifier, so a signature claimed by a
/// party can be checked without a separate key directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Did {
    key_part: String,
}

impl Did {
    /// Create a DID from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self {
            key_part: bs58::encode(public_key.as_bytes()).into_string(),
        }
    }

    /// Parse a DID from its string form
    pub fn parse(s: &str) -> Result<Self, DidError> {
        let parts: Vec<&str> = s.split(':').collect();
        let [scheme, method, key_part] = parts.as_slice() else {
            return Err(DidError::InvalidFormat(format!(
                "expected 3 parts separated by ':', got {}",
                parts.len()
            )));
        };

        if *scheme != DID_SCHEME {
            return Err(DidError::InvalidFormat(format!(
                "expected '{DID_SCHEME}' scheme, got '{scheme}'"
            )));
        }
        if *method != DID_METHOD {
            return Err(DidError::InvalidMethod(method.to_string()));
        }
        if key_part.is_empty() {
            return Err(DidError::InvalidFormat("key part cannot be empty".into()));
        }

        let did = Self {
            key_part: key_part.to_string(),
        };
        // Reject identifiers that do not decode to a usable key
        did.public_key()?;
        Ok(did)
    }

    /// Extract the public key embedded in this DID
    pub fn public_key(&self) -> Result<PublicKey, DidError> {
        let bytes = bs58::decode(&self.key_part)
            .into_vec()
            .map_err(|e| DidError::InvalidBase58(e.to_string()))?;
        Ok(PublicKey::from_bytes(&bytes)?)
    }

    /// Short form used in logs
    pub fn short(&self) -> &str {
        let end = self.key_part.len().min(8);
        &self.key_part[..end]
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DID_SCHEME}:{DID_METHOD}:{}", self.key_part)
    }
}

impl FromStr for Did {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
