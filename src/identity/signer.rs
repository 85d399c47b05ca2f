use crate::identity::{Did, Keypair};
use crate::transition::TransitionId;
use ed25519_dalek::{Signature as DalekSignature, Signer as DalekSigner, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const SIGNATURE_LENGTH: usize = 64;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Invalid signature length: expected 64, got {0}")]
    InvalidLength(usize),
}

/// Ed25519 signature (64 bytes)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    /// Get the raw bytes of the signature
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Create a signature from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let array: [u8; SIGNATURE_LENGTH] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Signature::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// A signature over a transition id together with the identity claiming it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub by: Did,
    pub signature: Signature,
}

impl TransactionSignature {
    /// Check this signature against the transition it claims to cover
    pub fn verify(&self, id: &TransitionId) -> bool {
        Signer::verify(&self.by, id, &self.signature)
    }
}

/// Identity/key service: signing and verification over transition ids
pub struct Signer;

impl Signer {
    /// Sign raw bytes with a keypair
    pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
        Signature(keypair.signing_key().sign(message).to_bytes())
    }

    /// Sign a transition id, tagging the result with the signer's identity
    pub fn sign_transition(keypair: &Keypair, id: &TransitionId) -> TransactionSignature {
        TransactionSignature {
            by: keypair.did(),
            signature: Self::sign(keypair, id.as_bytes()),
        }
    }

    /// Verify that `signer` produced `signature` over `id`
    ///
    /// Returns false for any signer whose DID does not carry a valid key.
    pub fn verify(signer: &Did, id: &TransitionId, signature: &Signature) -> bool {
        let Ok(public_key) = signer.public_key() else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&signature.0);
        public_key.inner().verify(id.as_bytes(), &sig).is_ok()
    }
}
