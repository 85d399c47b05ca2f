// Notary Tests
// Tests for uniqueness notarisation and the optional validating mode

use iouledger::contract::ContractViolation;
use iouledger::identity::Keypair;
use iouledger::notary::{Notary, NotaryConfig, NotaryError, UniquenessNotary};
use iouledger::transition::{SignedTransition, StateAndRef, StateRef, TransitionBuilder};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Setup {
    a: Keypair,
    b: Keypair,
    notary_key: Keypair,
    notary: UniquenessNotary,
}

fn setup(config: NotaryConfig) -> Setup {
    let notary_key = Keypair::generate();
    Setup {
        a: Keypair::generate(),
        b: Keypair::generate(),
        notary: UniquenessNotary::new(notary_key.clone(), config),
        notary_key,
    }
}

fn signed_create(s: &Setup, value: i64) -> SignedTransition {
    let tx = TransitionBuilder::build_create(value, s.a.did(), s.b.did(), s.notary_key.did());
    let mut stx = SignedTransition::new(tx);
    stx.sign(&s.a);
    stx.sign(&s.b);
    stx
}

/// A transfer of output 0 of `create` to a fresh party, signed by everyone
fn signed_transfer(s: &Setup, create: &SignedTransition) -> (SignedTransition, StateAndRef) {
    let consumed = create.transition().output_refs().remove(0);
    let to = Keypair::generate();
    let tx = TransitionBuilder::new(s.notary_key.did())
        .input(consumed.reference)
        .output(consumed.state.with_recipient(to.did()))
        .command(iouledger::contract::Command::Transfer {
            signers: vec![s.a.did(), s.b.did(), to.did()],
        })
        .build()
        .unwrap();
    let mut stx = SignedTransition::new(tx);
    for kp in [&s.a, &s.b, &to] {
        stx.sign(kp);
    }
    (stx, consumed)
}

// ============================================================================
// NOTARISATION
// ============================================================================

#[tokio::test]
async fn test_notarise_create() {
    let s = setup(NotaryConfig::default());
    let stx = signed_create(&s, 10);

    let sig = s.notary.notarise(&stx, &[]).await.unwrap();
    assert_eq!(sig.by, s.notary_key.did());
    assert!(sig.verify(&stx.id()));

    let finished = stx.with_signature(sig).unwrap();
    assert!(finished.verify_fully_signed().is_ok());
}

#[tokio::test]
async fn test_notarise_requires_all_participants() {
    let s = setup(NotaryConfig::default());
    let tx = TransitionBuilder::build_create(10, s.a.did(), s.b.did(), s.notary_key.did());
    let mut stx = SignedTransition::new(tx);
    stx.sign(&s.a);

    let result = s.notary.notarise(&stx, &[]).await;
    assert!(matches!(result, Err(NotaryError::Signatures(_))));
}

#[tokio::test]
async fn test_notarise_wrong_notary() {
    let s = setup(NotaryConfig::default());
    let other = Keypair::generate();
    let tx = TransitionBuilder::build_create(10, s.a.did(), s.b.did(), other.did());
    let mut stx = SignedTransition::new(tx);
    stx.sign(&s.a);
    stx.sign(&s.b);

    let result = s.notary.notarise(&stx, &[]).await;
    assert_eq!(result, Err(NotaryError::WrongNotary(other.did())));
}

/// Test: a second transition consuming the same input is a conflict
#[tokio::test]
async fn test_double_spend_conflict() {
    let s = setup(NotaryConfig::default());
    let create = signed_create(&s, 10);
    s.notary.notarise(&create, &[]).await.unwrap();

    let (first, consumed) = signed_transfer(&s, &create);
    let (second, _) = signed_transfer(&s, &create);
    s.notary.notarise(&first, std::slice::from_ref(&consumed)).await.unwrap();

    let result = s.notary.notarise(&second, std::slice::from_ref(&consumed)).await;
    assert_eq!(
        result,
        Err(NotaryError::Conflict {
            state_ref: consumed.reference,
            consumed_by: first.id(),
        })
    );
    assert_eq!(s.notary.consumed_count(), 1);
}

/// Test: resubmitting the same transition returns a signature again
#[tokio::test]
async fn test_notarise_is_idempotent() {
    let s = setup(NotaryConfig::default());
    let create = signed_create(&s, 10);
    let (transfer, consumed) = signed_transfer(&s, &create);

    let first = s.notary.notarise(&transfer, std::slice::from_ref(&consumed)).await.unwrap();
    let second = s.notary.notarise(&transfer, std::slice::from_ref(&consumed)).await.unwrap();
    assert_eq!(first.by, second.by);
    assert!(second.verify(&transfer.id()));
}

// ============================================================================
// VALIDATING MODE
// ============================================================================

#[tokio::test]
async fn test_non_validating_ignores_contract() {
    let s = setup(NotaryConfig::default());
    assert!(!s.notary.config().validating);
    let stx = signed_create(&s, -5);
    assert!(s.notary.notarise(&stx, &[]).await.is_ok());
}

#[tokio::test]
async fn test_validating_runs_contract() {
    let s = setup(NotaryConfig::new().with_validating(true));
    let stx = signed_create(&s, -5);

    let result = s.notary.notarise(&stx, &[]).await;
    assert_eq!(
        result,
        Err(NotaryError::Contract(ContractViolation::NegativeValue(-5)))
    );
    assert_eq!(s.notary.consumed_count(), 0);
}

#[tokio::test]
async fn test_validating_requires_resolved_inputs() {
    let s = setup(NotaryConfig::new().with_validating(true));
    let create = signed_create(&s, 10);
    let (transfer, _) = signed_transfer(&s, &create);

    let result = s.notary.notarise(&transfer, &[]).await;
    assert!(matches!(result, Err(NotaryError::Inputs(_))));

    let wrong_ref = StateAndRef {
        state: create.transition().outputs()[0].clone(),
        reference: StateRef::new(create.id(), 7),
    };
    let result = s.notary.notarise(&transfer, &[wrong_ref]).await;
    assert!(matches!(result, Err(NotaryError::Inputs(_))));
}
