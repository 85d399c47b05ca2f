use crate::identity::Did;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const KEY_LENGTH: usize = 32;

#[derive(Error, Debug)]
pub enum KeypairError {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid key bytes: {0}")]
    InvalidBytes(String),
}

fn to_key_array(bytes: &[u8]) -> Result<[u8; KEY_LENGTH], KeypairError> {
    bytes.try_into().map_err(|_| KeypairError::InvalidLength {
        expected: KEY_LENGTH,
        got: bytes.len(),
    })
}

/// Ed25519 verifying key of a ledger party
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Get the raw bytes of the public key
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Create a public key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeypairError> {
        let array = to_key_array(bytes)?;
        VerifyingKey::from_bytes(&array)
            .map(Self)
            .map_err(|e| KeypairError::InvalidBytes(e.to_string()))
    }

    pub(crate) fn inner(&self) -> &VerifyingKey {
        &self.0
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0.as_bytes())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 signing keypair held by a node
///
/// The secret half never leaves the node: it is only used through
/// [`Signer::sign_transition`](crate::identity::Signer::sign_transition).
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed
    pub fn from_seed(seed: [u8; KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }

    /// The ledger identity derived from this keypair
    pub fn did(&self) -> Did {
        Did::from_public_key(&self.public_key())
    }

    /// Secret key bytes (for persistence)
    pub fn to_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// Restore a keypair from secret key bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeypairError> {
        Ok(Self::from_seed(to_key_array(bytes)?))
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair").field("did", &self.did()).finish()
    }
}
