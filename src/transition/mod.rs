// Transition module - proposed ledger transitions, their signatures and encodings

mod builder;
mod codec;
mod model;
mod signed;

pub use builder::{BuildError, TransitionBuilder};
pub use codec::{CodecError, TransitionCodec};
pub use model::{LedgerTransition, StateAndRef, StateRef, Transition, TransitionError, TransitionId};
pub use signed::{SignedTransition, SignedTransitionError};
