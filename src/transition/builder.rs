use crate::contract::{Command, IOUState};
use crate::identity::Did;
use crate::storage::{LedgerStore, StoreError};
use crate::transition::{StateAndRef, StateRef, Transition};
use thiserror::Error;

/// Errors that can occur when building a transition
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Missing command: every transition needs a command")]
    MissingCommand,

    #[error("State {0} not found among unconsumed states")]
    StateNotFound(StateRef),

    #[error("Only the current recipient {holder} may transfer this IOU")]
    NotCurrentHolder { holder: Did },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Builder for unsigned transitions
///
/// Building never validates: the contract is run as a separate step right
/// after building and before any signature is requested.
pub struct TransitionBuilder {
    notary: Did,
    inputs: Vec<StateRef>,
    outputs: Vec<IOUState>,
    command: Option<Command>,
}

impl TransitionBuilder {
    /// Start a transition that will be notarised by `notary`
    pub fn new(notary: Did) -> Self {
        Self {
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            command: None,
        }
    }

    /// Add a consumed state reference
    pub fn input(mut self, state_ref: StateRef) -> Self {
        self.inputs.push(state_ref);
        self
    }

    /// Add a produced state
    pub fn output(mut self, state: IOUState) -> Self {
        self.outputs.push(state);
        self
    }

    /// Set the command (required)
    pub fn command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    pub fn build(self) -> Result<Transition, BuildError> {
        let command = self.command.ok_or(BuildError::MissingCommand)?;
        Ok(Transition::new(self.inputs, self.outputs, command, self.notary))
    }

    /// Propose a brand-new obligation from `sender` to `recipient`
    pub fn build_create(value: i64, sender: Did, recipient: Did, notary: Did) -> Transition {
        let signers = vec![sender.clone(), recipient.clone()];
        Transition::new(
            Vec::new(),
            vec![IOUState::issue(value, sender, recipient)],
            Command::Create { signers },
            notary,
        )
    }

    /// Propose reassigning the unconsumed state at `consumed_ref` to `new_recipient`
    ///
    /// Only the state's current recipient (`initiator`) may do this. Returns the
    /// transition together with the consumed state it was built from.
    pub fn build_transfer(
        store: &dyn LedgerStore,
        initiator: &Did,
        consumed_ref: &StateRef,
        new_recipient: Did,
        notary: Did,
    ) -> Result<(Transition, StateAndRef), BuildError> {
        let consumed = store
            .get_unconsumed(consumed_ref)?
            .ok_or(BuildError::StateNotFound(*consumed_ref))?;

        let holder = consumed.state.recipient();
        if holder != initiator {
            return Err(BuildError::NotCurrentHolder {
                holder: holder.clone(),
            });
        }

        let mut signers = vec![consumed.state.sender().clone(), holder.clone()];
        if !signers.contains(&new_recipient) {
            signers.push(new_recipient.clone());
        }

        let transition = TransitionBuilder::new(notary)
            .input(consumed.reference)
            .output(consumed.state.with_recipient(new_recipient))
            .command(Command::Transfer { signers })
            .build()?;
        Ok((transition, consumed))
    }
}
