// Identity Tests
// Tests for keypairs, DIDs and signatures over transition ids

use iouledger::identity::{Did, DidError, Keypair, Signature, Signer, TransactionSignature};
use iouledger::transition::TransitionId;

fn test_id(byte: u8) -> TransitionId {
    TransitionId::from_bytes([byte; 32])
}

// ============================================================================
// KEYPAIRS AND DIDS
// ============================================================================

#[test]
fn test_keypair_roundtrip_keeps_identity() {
    let kp = Keypair::generate();
    let restored = Keypair::from_bytes(&kp.to_bytes()).unwrap();
    assert_eq!(kp.did(), restored.did());
}

#[test]
fn test_seeded_keypairs_are_deterministic() {
    let a = Keypair::from_seed([7u8; 32]);
    let b = Keypair::from_seed([7u8; 32]);
    let c = Keypair::from_seed([8u8; 32]);
    assert_eq!(a.did(), b.did());
    assert_ne!(a.did(), c.did());
}

#[test]
fn test_did_string_roundtrip() {
    let did = Keypair::generate().did();
    let s = did.to_string();
    assert!(s.starts_with("did:iou:"));

    let parsed: Did = s.parse().unwrap();
    assert_eq!(parsed, did);
    assert_eq!(parsed.public_key().unwrap(), did.public_key().unwrap());
}

#[test]
fn test_did_parse_rejects_wrong_method() {
    let did = Keypair::generate().did().to_string().replace("did:iou:", "did:key:");
    assert!(matches!(Did::parse(&did), Err(DidError::InvalidMethod(m)) if m == "key"));
}

#[test]
fn test_did_parse_rejects_malformed() {
    assert!(matches!(Did::parse("did:iou"), Err(DidError::InvalidFormat(_))));
    assert!(matches!(Did::parse("did:iou:"), Err(DidError::InvalidFormat(_))));
    assert!(matches!(Did::parse("did:iou:0OIl"), Err(DidError::InvalidBase58(_))));
    // Valid base58, wrong key length
    assert!(matches!(Did::parse("did:iou:abc"), Err(DidError::InvalidPublicKey(_))));
}

#[test]
fn test_did_ordering_is_total() {
    let mut dids: Vec<Did> = (0..5).map(|_| Keypair::generate().did()).collect();
    dids.sort();
    for pair in dids.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

// ============================================================================
// SIGNATURES
// ============================================================================

/// Test: a signature verifies only for its signer and the id it covers
#[test]
fn test_transition_signature_binds_signer_and_id() {
    let kp = Keypair::generate();
    let other = Keypair::generate();
    let sig = Signer::sign_transition(&kp, &test_id(1));

    assert_eq!(sig.by, kp.did());
    assert!(sig.verify(&test_id(1)));
    assert!(!sig.verify(&test_id(2)));
    assert!(!Signer::verify(&other.did(), &test_id(1), &sig.signature));
}

/// Test: claiming someone else's identity does not verify
#[test]
fn test_forged_claim_fails() {
    let honest = Keypair::generate();
    let forger = Keypair::generate();
    let forged = TransactionSignature {
        by: honest.did(),
        signature: Signer::sign(&forger, test_id(3).as_bytes()),
    };
    assert!(!forged.verify(&test_id(3)));
}

#[test]
fn test_signature_from_bytes_checks_length() {
    assert!(Signature::from_bytes(&[0u8; 63]).is_err());
    assert!(Signature::from_bytes(&[0u8; 64]).is_ok());
}

#[test]
fn test_zero_signature_never_verifies() {
    let kp = Keypair::generate();
    let zero = Signature::from_bytes(&[0u8; 64]).unwrap();
    assert!(!Signer::verify(&kp.did(), &test_id(4), &zero));
}
