// Notary - uniqueness service for consumed state references
//
// The notary is the single source of truth for double-spend prevention:
// any given state reference is accepted as an input at most once across
// every submission it processes.

use crate::contract::ContractViolation;
use crate::identity::{Did, Keypair, Signer, TransactionSignature};
use crate::transition::{SignedTransition, StateAndRef, StateRef, TransitionError, TransitionId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a notary refuses to sign
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotaryError {
    #[error("Transition names notary {0}, not this notary")]
    WrongNotary(Did),

    #[error("Signature check failed: {0}")]
    Signatures(String),

    #[error("Input {state_ref} already consumed by transition {consumed_by}")]
    Conflict {
        state_ref: StateRef,
        consumed_by: TransitionId,
    },

    #[error("Contract verification failed: {0}")]
    Contract(#[from] ContractViolation),

    #[error("Resolved inputs rejected: {0}")]
    Inputs(#[from] TransitionError),

    #[error("Notary unavailable: {0}")]
    Unavailable(String),
}

/// Notary behaviour switches
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotaryConfig {
    /// Also run the IOU contract against the caller-supplied inputs
    pub validating: bool,
}

impl NotaryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validating(mut self, validating: bool) -> Self {
        self.validating = validating;
        self
    }
}

/// Notary service interface
#[async_trait]
pub trait Notary: Send + Sync {
    /// Identity whose signature finalises a transition
    fn identity(&self) -> Did;

    /// Check uniqueness of the inputs and return the notary signature
    ///
    /// `inputs` are the resolved input states; a non-validating notary
    /// ignores them.
    async fn notarise(
        &self,
        stx: &SignedTransition,
        inputs: &[StateAndRef],
    ) -> Result<TransactionSignature, NotaryError>;
}

/// In-process notary that keeps the consumed-reference map in memory
pub struct UniquenessNotary {
    keypair: Keypair,
    config: NotaryConfig,
    consumed: Mutex<HashMap<StateRef, TransitionId>>,
}

impl UniquenessNotary {
    pub fn new(keypair: Keypair, config: NotaryConfig) -> Self {
        Self {
            keypair,
            config,
            consumed: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &NotaryConfig {
        &self.config
    }

    /// Number of state references consumed so far
    pub fn consumed_count(&self) -> usize {
        self.consumed.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn commit(&self, stx: &SignedTransition) -> Result<(), NotaryError> {
        let id = stx.id();
        let mut consumed = self
            .consumed
            .lock()
            .map_err(|_| NotaryError::Unavailable("consumed map poisoned".into()))?;

        for input in stx.transition().inputs() {
            match consumed.get(input) {
                Some(by) if *by != id => {
                    return Err(NotaryError::Conflict {
                        state_ref: *input,
                        consumed_by: *by,
                    });
                }
                _ => {}
            }
        }
        for input in stx.transition().inputs() {
            consumed.insert(*input, id);
        }
        Ok(())
    }
}

#[async_trait]
impl Notary for UniquenessNotary {
    fn identity(&self) -> Did {
        self.keypair.did()
    }

    async fn notarise(
        &self,
        stx: &SignedTransition,
        inputs: &[StateAndRef],
    ) -> Result<TransactionSignature, NotaryError> {
        let me = self.identity();
        let id = stx.id();
        debug!(tx = %id, inputs = stx.transition().inputs().len(), "notarisation requested");

        if stx.transition().notary() != &me {
            return Err(NotaryError::WrongNotary(stx.transition().notary().clone()));
        }
        stx.verify_signatures_except(&[&me])
            .map_err(|e| NotaryError::Signatures(e.to_string()))?;

        if self.config.validating {
            stx.transition().resolve(inputs.to_vec())?.verify()?;
        }

        if let Err(e) = self.commit(stx) {
            warn!(tx = %id, error = %e, "notarisation rejected");
            return Err(e);
        }

        info!(tx = %id, "notarised");
        Ok(Signer::sign_transition(&self.keypair, &id))
    }
}
