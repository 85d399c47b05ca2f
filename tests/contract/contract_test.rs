// Contract Tests
// Tests for IOU states and the Create/Transfer rules

use iouledger::contract::{Command, ContractViolation, IOUContract, IOUState, LinearId};
use iouledger::identity::{Did, Keypair};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn parties() -> (Did, Did, Did) {
    (
        Keypair::generate().did(),
        Keypair::generate().did(),
        Keypair::generate().did(),
    )
}

fn create(value: i64, sender: &Did, recipient: &Did) -> (IOUState, Command) {
    let state = IOUState::issue(value, sender.clone(), recipient.clone());
    let command = Command::Create {
        signers: vec![sender.clone(), recipient.clone()],
    };
    (state, command)
}

// ============================================================================
// STATE
// ============================================================================

#[test]
fn test_participants_are_sender_and_recipient() {
    let (a, b, c) = parties();
    let state = IOUState::issue(10, a.clone(), b.clone());

    assert_eq!(state.participants(), [&a, &b]);
    assert!(state.is_relevant(&a));
    assert!(state.is_relevant(&b));
    assert!(!state.is_relevant(&c));
}

#[test]
fn test_with_recipient_keeps_linear_id_and_value() {
    let (a, b, c) = parties();
    let state = IOUState::issue(10, a.clone(), b);
    let moved = state.with_recipient(c.clone());

    assert_eq!(moved.linear_id(), state.linear_id());
    assert_eq!(moved.value(), 10);
    assert_eq!(moved.sender(), &a);
    assert_eq!(moved.recipient(), &c);
}

#[test]
fn test_linear_ids_are_unique() {
    assert_ne!(LinearId::generate(), LinearId::generate());
}

// ============================================================================
// CREATE
// ============================================================================

#[test]
fn test_create_valid() {
    let (a, b, _) = parties();
    let (state, command) = create(10, &a, &b);
    assert!(IOUContract::verify(&[], &[state], &command).is_ok());
}

#[test]
fn test_create_zero_value_allowed() {
    let (a, b, _) = parties();
    let (state, command) = create(0, &a, &b);
    assert!(IOUContract::verify(&[], &[state], &command).is_ok());
}

#[test]
fn test_create_negative_value() {
    let (a, b, _) = parties();
    let (state, command) = create(-1, &a, &b);
    assert_eq!(
        IOUContract::verify(&[], &[state], &command),
        Err(ContractViolation::NegativeValue(-1))
    );
}

#[test]
fn test_create_self_obligation() {
    let (a, _, _) = parties();
    let (state, command) = create(5, &a, &a);
    assert_eq!(
        IOUContract::verify(&[], &[state], &command),
        Err(ContractViolation::SelfObligation)
    );
}

#[test]
fn test_create_rejects_inputs() {
    let (a, b, _) = parties();
    let (state, command) = create(5, &a, &b);
    let prior = IOUState::issue(1, a.clone(), b.clone());
    assert_eq!(
        IOUContract::verify(&[prior], &[state], &command),
        Err(ContractViolation::InputsOnCreate(1))
    );
}

#[test]
fn test_create_rejects_two_outputs() {
    let (a, b, _) = parties();
    let (state, command) = create(5, &a, &b);
    assert_eq!(
        IOUContract::verify(&[], &[state.clone(), state], &command),
        Err(ContractViolation::OutputCount(2))
    );
}

/// Test: signer set must equal the participants, no more and no less
#[test]
fn test_create_signers_must_match_participants() {
    let (a, b, c) = parties();
    let state = IOUState::issue(5, a.clone(), b.clone());

    let too_few = Command::Create { signers: vec![a.clone()] };
    assert_eq!(
        IOUContract::verify(&[], &[state.clone()], &too_few),
        Err(ContractViolation::SignersMismatch)
    );

    let too_many = Command::Create {
        signers: vec![a, b, c],
    };
    assert_eq!(
        IOUContract::verify(&[], &[state], &too_many),
        Err(ContractViolation::SignersMismatch)
    );
}

// ============================================================================
// TRANSFER
// ============================================================================

fn transfer_signers(consumed: &IOUState, produced: &IOUState) -> Command {
    Command::Transfer {
        signers: vec![
            consumed.sender().clone(),
            consumed.recipient().clone(),
            produced.recipient().clone(),
        ],
    }
}

#[test]
fn test_transfer_valid() {
    let (a, b, c) = parties();
    let consumed = IOUState::issue(10, a, b);
    let produced = consumed.with_recipient(c);
    let command = transfer_signers(&consumed, &produced);

    assert!(IOUContract::verify(&[consumed], &[produced], &command).is_ok());
}

#[test]
fn test_transfer_linear_id_changed() {
    let (a, b, c) = parties();
    let consumed = IOUState::issue(10, a.clone(), b);
    let produced = IOUState::issue(10, a, c);
    let command = transfer_signers(&consumed, &produced);

    assert_eq!(
        IOUContract::verify(&[consumed], &[produced], &command),
        Err(ContractViolation::LinearIdChanged)
    );
}

#[test]
fn test_transfer_sender_changed() {
    let (a, b, c) = parties();
    let consumed = IOUState::issue(10, a, b.clone());
    let produced = IOUState::new(10, c.clone(), c, *consumed.linear_id());
    let command = transfer_signers(&consumed, &produced);

    assert_eq!(
        IOUContract::verify(&[consumed], &[produced], &command),
        Err(ContractViolation::SenderChanged)
    );
}

#[test]
fn test_transfer_value_changed() {
    let (a, b, c) = parties();
    let consumed = IOUState::issue(10, a.clone(), b);
    let produced = IOUState::new(11, a, c, *consumed.linear_id());
    let command = transfer_signers(&consumed, &produced);

    assert_eq!(
        IOUContract::verify(&[consumed], &[produced], &command),
        Err(ContractViolation::ValueChanged {
            consumed: 10,
            produced: 11
        })
    );
}

#[test]
fn test_transfer_to_same_recipient() {
    let (a, b, _) = parties();
    let consumed = IOUState::issue(10, a, b.clone());
    let produced = consumed.with_recipient(b);
    let command = transfer_signers(&consumed, &produced);

    assert_eq!(
        IOUContract::verify(&[consumed], &[produced], &command),
        Err(ContractViolation::RecipientUnchanged)
    );
}

#[test]
fn test_transfer_back_to_sender() {
    let (a, b, _) = parties();
    let consumed = IOUState::issue(10, a.clone(), b);
    let produced = consumed.with_recipient(a);
    let command = transfer_signers(&consumed, &produced);

    assert_eq!(
        IOUContract::verify(&[consumed], &[produced], &command),
        Err(ContractViolation::SelfObligation)
    );
}

/// Test: the original sender's signature is required, not only the holders'
#[test]
fn test_transfer_missing_original_sender() {
    let (a, b, c) = parties();
    let consumed = IOUState::issue(10, a.clone(), b.clone());
    let produced = consumed.with_recipient(c.clone());
    let command = Command::Transfer { signers: vec![b, c] };

    assert_eq!(
        IOUContract::verify(&[consumed], &[produced], &command),
        Err(ContractViolation::MissingSigners(vec![a]))
    );
}

#[test]
fn test_transfer_requires_single_input() {
    let (a, b, c) = parties();
    let consumed = IOUState::issue(10, a, b);
    let produced = consumed.with_recipient(c);
    let command = transfer_signers(&consumed, &produced);

    assert_eq!(
        IOUContract::verify(&[], &[produced], &command),
        Err(ContractViolation::InputCount(0))
    );
}
