use crate::identity::{Did, Keypair, Signature, Signer, TransactionSignature};
use crate::transition::{Transition, TransitionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignedTransitionError {
    #[error("Invalid signature from {0}")]
    InvalidSignature(Did),

    #[error("Signature from {0}, which is not a required signer")]
    UnexpectedSigner(Did),

    #[error("Missing signatures from {}", .0.len())]
    MissingSignatures(Vec<Did>),
}

/// A transition plus the signatures collected over its id
///
/// Signatures are only ever added. The notary's signature is the last one
/// attached, after which the transition is final.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransition {
    tx: Transition,
    sigs: BTreeMap<Did, Signature>,
}

impl SignedTransition {
    /// Wrap an unsigned transition
    pub fn new(tx: Transition) -> Self {
        Self {
            tx,
            sigs: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> TransitionId {
        self.tx.id()
    }

    pub fn transition(&self) -> &Transition {
        &self.tx
    }

    /// All signatures collected so far
    pub fn signatures(&self) -> Vec<TransactionSignature> {
        self.sigs
            .iter()
            .map(|(by, signature)| TransactionSignature {
                by: by.clone(),
                signature: signature.clone(),
            })
            .collect()
    }

    pub fn has_signature_from(&self, party: &Did) -> bool {
        self.sigs.contains_key(party)
    }

    pub fn notary_signature(&self) -> Option<TransactionSignature> {
        let notary = self.tx.notary();
        self.sigs.get(notary).map(|signature| TransactionSignature {
            by: notary.clone(),
            signature: signature.clone(),
        })
    }

    /// Command signers followed by the notary
    pub fn required_signers(&self) -> Vec<Did> {
        let mut required = self.tx.command().signers().to_vec();
        required.push(self.tx.notary().clone());
        required
    }

    /// Required signers that have not signed yet
    pub fn missing_signatures(&self) -> Vec<Did> {
        self.required_signers()
            .into_iter()
            .filter(|d| !self.sigs.contains_key(d))
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.missing_signatures().is_empty()
    }

    /// Sign with `keypair` and attach the result
    pub fn sign(&mut self, keypair: &Keypair) -> TransactionSignature {
        let sig = Signer::sign_transition(keypair, &self.id());
        self.sigs.entry(sig.by.clone()).or_insert_with(|| sig.signature.clone());
        sig
    }

    /// Attach a signature after checking it against this transition's id
    ///
    /// A signer that already signed keeps its existing signature.
    pub fn add_signature(&mut self, sig: TransactionSignature) -> Result<(), SignedTransitionError> {
        if !self.required_signers().contains(&sig.by) {
            return Err(SignedTransitionError::UnexpectedSigner(sig.by));
        }
        if !sig.verify(&self.id()) {
            return Err(SignedTransitionError::InvalidSignature(sig.by));
        }
        self.sigs.entry(sig.by).or_insert(sig.signature);
        Ok(())
    }

    /// Builder-style [`add_signature`](Self::add_signature)
    pub fn with_signature(mut self, sig: TransactionSignature) -> Result<Self, SignedTransitionError> {
        self.add_signature(sig)?;
        Ok(self)
    }

    /// Check every present signature, allowing only `allowed_missing` to be absent
    pub fn verify_signatures_except(&self, allowed_missing: &[&Did]) -> Result<(), SignedTransitionError> {
        let id = self.id();
        let required = self.required_signers();

        for (by, signature) in &self.sigs {
            if !required.contains(by) {
                return Err(SignedTransitionError::UnexpectedSigner(by.clone()));
            }
            if !Signer::verify(by, &id, signature) {
                return Err(SignedTransitionError::InvalidSignature(by.clone()));
            }
        }

        let missing: Vec<Did> = self
            .missing_signatures()
            .into_iter()
            .filter(|d| !allowed_missing.contains(&d))
            .collect();
        if !missing.is_empty() {
            return Err(SignedTransitionError::MissingSignatures(missing));
        }
        Ok(())
    }

    /// Check that the transition is final: every required signer, notary included
    pub fn verify_fully_signed(&self) -> Result<(), SignedTransitionError> {
        self.verify_signatures_except(&[])
    }
}
