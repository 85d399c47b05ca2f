use crate::contract::ContractViolation;
use crate::identity::Did;
use crate::notary::NotaryError;
use crate::storage::StoreError;
use crate::transition::{BuildError, SignedTransitionError, StateRef, TransitionError, TransitionId};
use crate::transport::TransportError;
use thiserror::Error;

/// Typed failures surfaced to the caller of a flow
///
/// Nothing is persisted when a flow fails; partial signature sets only live
/// in the failed session.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Deterministic rule breach; never retried
    #[error("Contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),

    /// A signature did not verify for its claimed signer and the transition id
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The counterparty's own validation failed; its reason is kept verbatim
    #[error("Counterparty {party} rejected the transition: {reason}")]
    CounterpartyRejected { party: Did, reason: String },

    /// Ancestry could not be obtained or failed verification
    #[error("Unresolvable dependency: {0}")]
    UnresolvableDependency(String),

    /// The counterparty could not be reached or stopped answering
    #[error("Counterparty {party} unavailable: {reason}")]
    CounterpartyUnavailable { party: Did, reason: String },

    #[error("Notary rejected the transition: {0}")]
    NotaryRejected(#[from] NotaryError),

    #[error("Only the current recipient {holder} may transfer this IOU")]
    NotCurrentHolder { holder: Did },

    #[error("State {0} not found among unconsumed states")]
    StateNotFound(StateRef),

    #[error("State {state_ref} already consumed by transition {consumed_by}")]
    DoubleSpend {
        state_ref: StateRef,
        consumed_by: TransitionId,
    },

    #[error("Protocol violation by {party}: {reason}")]
    ProtocolViolation { party: Did, reason: String },

    #[error("Flow aborted by {party}: {reason}")]
    Aborted { party: Did, reason: String },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl FlowError {
    /// Map a session failure with `party` onto the flow taxonomy
    pub fn from_transport(party: &Did, err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(_) | TransportError::Timeout | TransportError::Closed => {
                FlowError::CounterpartyUnavailable {
                    party: party.clone(),
                    reason: err.to_string(),
                }
            }
            TransportError::UnexpectedMessage { .. } | TransportError::Protocol(_) => {
                FlowError::ProtocolViolation {
                    party: party.clone(),
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Only a flow that failed for lack of a counterparty may be rerun from scratch
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::CounterpartyUnavailable { .. })
    }
}

impl From<BuildError> for FlowError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::StateNotFound(state_ref) => FlowError::StateNotFound(state_ref),
            BuildError::NotCurrentHolder { holder } => FlowError::NotCurrentHolder { holder },
            BuildError::Storage(e) => FlowError::Storage(e),
            BuildError::MissingCommand => FlowError::InvalidTransition("missing command".into()),
        }
    }
}

impl From<TransitionError> for FlowError {
    fn from(err: TransitionError) -> Self {
        FlowError::InvalidTransition(err.to_string())
    }
}

impl From<SignedTransitionError> for FlowError {
    fn from(err: SignedTransitionError) -> Self {
        FlowError::InvalidSignature(err.to_string())
    }
}
