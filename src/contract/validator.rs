use crate::contract::{Command, IOUState};
use crate::identity::Did;
use std::collections::BTreeSet;
use thiserror::Error;

/// First contract rule a transition breaks
///
/// Rules are pure functions of the transition contents and are checked in
/// a fixed order, so every party reports the same violation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("No inputs should be consumed when creating an IOU (got {0})")]
    InputsOnCreate(usize),

    #[error("Exactly one input must be consumed when transferring an IOU (got {0})")]
    InputCount(usize),

    #[error("Exactly one output state must be produced (got {0})")]
    OutputCount(usize),

    #[error("The IOU's value must be non-negative (got {0})")]
    NegativeValue(i64),

    #[error("The sender and the recipient cannot be the same party")]
    SelfObligation,

    #[error("The signers must be exactly the output's participants")]
    SignersMismatch,

    #[error("The input and output IOUs must share a linear id")]
    LinearIdChanged,

    #[error("The input and output IOUs must have the same sender")]
    SenderChanged,

    #[error("The input and output IOUs must have the same value ({consumed} != {produced})")]
    ValueChanged { consumed: i64, produced: i64 },

    #[error("The input and output IOUs must have different recipients")]
    RecipientUnchanged,

    #[error("Missing required signers: {}", format_dids(.0))]
    MissingSigners(Vec<Did>),
}

fn format_dids(dids: &[Did]) -> String {
    dids.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of a contract check
pub type ValidationResult = Result<(), ContractViolation>;

/// The fixed IOU contract
pub struct IOUContract;

impl IOUContract {
    /// Verify a transition whose inputs have been resolved to states
    pub fn verify(inputs: &[IOUState], outputs: &[IOUState], command: &Command) -> ValidationResult {
        match command {
            Command::Create { signers } => Self::validate_create(inputs, outputs, signers),
            Command::Transfer { signers } => Self::validate_transfer(inputs, outputs, signers),
        }
    }

    /// Rules for originating a new obligation
    pub fn validate_create(inputs: &[IOUState], outputs: &[IOUState], signers: &[Did]) -> ValidationResult {
        if !inputs.is_empty() {
            return Err(ContractViolation::InputsOnCreate(inputs.len()));
        }
        let [produced] = outputs else {
            return Err(ContractViolation::OutputCount(outputs.len()));
        };
        if produced.value() < 0 {
            return Err(ContractViolation::NegativeValue(produced.value()));
        }
        if produced.sender() == produced.recipient() {
            return Err(ContractViolation::SelfObligation);
        }

        let signer_set: BTreeSet<&Did> = signers.iter().collect();
        let participants: BTreeSet<&Did> = produced.participants().into_iter().collect();
        if signer_set != participants {
            return Err(ContractViolation::SignersMismatch);
        }
        Ok(())
    }

    /// Rules for reassigning an existing obligation to a new recipient
    pub fn validate_transfer(inputs: &[IOUState], outputs: &[IOUState], signers: &[Did]) -> ValidationResult {
        let [consumed] = inputs else {
            return Err(ContractViolation::InputCount(inputs.len()));
        };
        let [produced] = outputs else {
            return Err(ContractViolation::OutputCount(outputs.len()));
        };

        if produced.linear_id() != consumed.linear_id() {
            return Err(ContractViolation::LinearIdChanged);
        }
        if produced.sender() != consumed.sender() {
            return Err(ContractViolation::SenderChanged);
        }
        if produced.value() != consumed.value() {
            return Err(ContractViolation::ValueChanged {
                consumed: consumed.value(),
                produced: produced.value(),
            });
        }
        if produced.recipient() == consumed.recipient() {
            return Err(ContractViolation::RecipientUnchanged);
        }
        if produced.sender() == produced.recipient() {
            return Err(ContractViolation::SelfObligation);
        }

        let required = [consumed.sender(), consumed.recipient(), produced.recipient()];
        let mut missing: Vec<Did> = Vec::new();
        for party in required {
            if !signers.contains(party) && !missing.contains(party) {
                missing.push(party.clone());
            }
        }
        if !missing.is_empty() {
            return Err(ContractViolation::MissingSigners(missing));
        }
        Ok(())
    }
}
