// Committed ledger - the local record of finalised transitions
//
// Only fully signed, notarised transitions are ever written. Writes are
// serialised so two transitions consuming the same state reference can
// never both be recorded.

use crate::identity::Did;
use crate::transition::{SignedTransition, StateAndRef, StateRef, TransitionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    #[error("State {state_ref} already consumed by transition {consumed_by}")]
    AlreadyConsumed {
        state_ref: StateRef,
        consumed_by: TransitionId,
    },

    #[error("Refusing to record a transition that is not final: {0}")]
    NotFinal(String),

    #[error("Ledger lock poisoned")]
    Poisoned,
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// A finalised transition as recorded locally
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommittedTransition {
    pub transition: SignedTransition,
    pub recorded_at: DateTime<Utc>,
}

impl CommittedTransition {
    pub fn now(transition: SignedTransition) -> Self {
        Self {
            transition,
            recorded_at: Utc::now(),
        }
    }
}

/// Local ledger storage
pub trait LedgerStore: Send + Sync {
    /// Record a finalised transition; recording the same transition twice is a no-op
    fn put(&self, stx: &SignedTransition) -> Result<(), StoreError>;

    fn get_transaction(&self, id: &TransitionId) -> Result<Option<SignedTransition>, StoreError>;

    /// Which transition consumed `state_ref`, if any
    fn consumed_by(&self, state_ref: &StateRef) -> Result<Option<TransitionId>, StoreError>;

    /// Every unconsumed output held locally
    fn unconsumed_states(&self) -> Result<Vec<StateAndRef>, StoreError>;

    fn transaction_count(&self) -> Result<usize, StoreError>;

    fn has_transaction(&self, id: &TransitionId) -> Result<bool, StoreError> {
        Ok(self.get_transaction(id)?.is_some())
    }

    /// Look up the state at `state_ref`, consumed or not
    fn get_state(&self, state_ref: &StateRef) -> Result<Option<StateAndRef>, StoreError> {
        let Some(stx) = self.get_transaction(&state_ref.txid)? else {
            return Ok(None);
        };
        Ok(stx
            .transition()
            .outputs()
            .get(state_ref.index as usize)
            .map(|state| StateAndRef {
                state: state.clone(),
                reference: *state_ref,
            }))
    }

    fn get_unconsumed(&self, state_ref: &StateRef) -> Result<Option<StateAndRef>, StoreError> {
        if self.consumed_by(state_ref)?.is_some() {
            return Ok(None);
        }
        self.get_state(state_ref)
    }

    /// Unconsumed states in which `party` is a participant
    fn relevant_states(&self, party: &Did) -> Result<Vec<StateAndRef>, StoreError> {
        Ok(self
            .unconsumed_states()?
            .into_iter()
            .filter(|s| s.state.is_relevant(party))
            .collect())
    }
}

/// Checks shared by every store before a write
pub(crate) fn check_final(stx: &SignedTransition) -> Result<(), StoreError> {
    stx.verify_fully_signed()
        .map_err(|e| StoreError::NotFinal(e.to_string()))
}

#[derive(Default)]
struct MemoryInner {
    transactions: HashMap<TransitionId, CommittedTransition>,
    consumed: HashMap<StateRef, TransitionId>,
    order: Vec<TransitionId>,
}

/// In-memory ledger store
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<MemoryInner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// When a transition was recorded
    pub fn recorded_at(&self, id: &TransitionId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.transactions.get(id).map(|c| c.recorded_at))
    }
}

impl LedgerStore for MemoryLedger {
    fn put(&self, stx: &SignedTransition) -> Result<(), StoreError> {
        check_final(stx)?;
        let id = stx.id();
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;

        if inner.transactions.contains_key(&id) {
            return Ok(());
        }
        for input in stx.transition().inputs() {
            if let Some(consumed_by) = inner.consumed.get(input) {
                return Err(StoreError::AlreadyConsumed {
                    state_ref: *input,
                    consumed_by: *consumed_by,
                });
            }
        }

        for input in stx.transition().inputs() {
            inner.consumed.insert(*input, id);
        }
        inner.transactions.insert(id, CommittedTransition::now(stx.clone()));
        inner.order.push(id);
        Ok(())
    }

    fn get_transaction(&self, id: &TransitionId) -> Result<Option<SignedTransition>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.transactions.get(id).map(|c| c.transition.clone()))
    }

    fn consumed_by(&self, state_ref: &StateRef) -> Result<Option<TransitionId>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.consumed.get(state_ref).copied())
    }

    fn unconsumed_states(&self) -> Result<Vec<StateAndRef>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let mut states = Vec::new();
        for id in &inner.order {
            let Some(committed) = inner.transactions.get(id) else {
                continue;
            };
            for output in committed.transition.transition().output_refs() {
                if !inner.consumed.contains_key(&output.reference) {
                    states.push(output);
                }
            }
        }
        Ok(states)
    }

    fn transaction_count(&self) -> Result<usize, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.transactions.len())
    }
}
