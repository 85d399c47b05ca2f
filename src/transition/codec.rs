use crate::transition::SignedTransition;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode transition: {0}")]
    EncodeError(String),

    #[error("Failed to decode transition: {0}")]
    DecodeError(String),

    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid base64 string: {0}")]
    InvalidBase64(String),
}

/// Binary and text encodings for signed transitions
pub struct TransitionCodec;

impl TransitionCodec {
    /// Compact binary form (postcard)
    pub fn encode(stx: &SignedTransition) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(stx).map_err(|e| CodecError::EncodeError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<SignedTransition, CodecError> {
        postcard::from_bytes(bytes).map_err(|e| CodecError::DecodeError(e.to_string()))
    }

    pub fn encode_hex(stx: &SignedTransition) -> Result<String, CodecError> {
        Ok(hex::encode(Self::encode(stx)?))
    }

    pub fn decode_hex(s: &str) -> Result<SignedTransition, CodecError> {
        let bytes = hex::decode(s).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// URL-safe base64 without padding
    pub fn encode_base64(stx: &SignedTransition) -> Result<String, CodecError> {
        Ok(URL_SAFE_NO_PAD.encode(Self::encode(stx)?))
    }

    pub fn decode_base64(s: &str) -> Result<SignedTransition, CodecError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
        Self::decode(&bytes)
    }
}
