// Identity module - party keys, DIDs and transition signatures

mod did;
mod keypair;
mod signer;

pub use did::{Did, DidError};
pub use keypair::{Keypair, KeypairError, PublicKey};
pub use signer::{Signature, SignatureError, Signer, TransactionSignature};
