// Transfer Flow - reassign an existing IOU to a new recipient
//
// Only the current holder may initiate. Signatures are collected one round
// at a time: the original sender first, then the new recipient. The new
// recipient fetches the IOU's ancestry from the holder before signing.

use crate::contract::CommandKind;
use crate::flows::collector::{request_signature, respond};
use crate::flows::finality::{abort_sessions, finalise, receive_finality};
use crate::flows::progress::{FlowStage, ProgressTracker};
use crate::flows::{FlowContext, FlowError};
use crate::identity::Did;
use crate::transition::{SignedTransition, StateRef, TransitionBuilder};
use crate::transport::{Proposal, Session};
use tracing::{debug, info, warn};

/// Initiator side of an IOU transfer
pub struct TransferFlow<'a> {
    ctx: &'a FlowContext,
    state_ref: StateRef,
    new_recipient: Did,
    progress: ProgressTracker,
}

impl<'a> TransferFlow<'a> {
    pub fn new(ctx: &'a FlowContext, state_ref: StateRef, new_recipient: Did) -> Self {
        Self {
            ctx,
            state_ref,
            new_recipient,
            progress: ProgressTracker::new("transfer"),
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub async fn run(&mut self) -> Result<SignedTransition, FlowError> {
        match self.execute().await {
            Ok(stx) => {
                self.progress.advance(FlowStage::Done);
                Ok(stx)
            }
            Err(err) => {
                warn!(state = %self.state_ref, error = %err, "transfer flow failed");
                self.progress.fail(err.to_string());
                Err(err)
            }
        }
    }

    async fn execute(&mut self) -> Result<SignedTransition, FlowError> {
        let ctx = self.ctx;
        let (tx, consumed) = TransitionBuilder::build_transfer(
            ctx.store(),
            ctx.me(),
            &self.state_ref,
            self.new_recipient.clone(),
            ctx.notary_identity().clone(),
        )?;

        self.progress.advance(FlowStage::Verifying);
        tx.resolve(vec![consumed.clone()])?.verify()?;

        self.progress.advance(FlowStage::Signing);
        let mut stx = SignedTransition::new(tx);
        ctx.sign(&mut stx);

        self.progress.advance(FlowStage::CollectingSignatures);
        let mut signers: Vec<Did> = Vec::with_capacity(2);
        for party in [consumed.state.sender(), &self.new_recipient] {
            if party != ctx.me() && !signers.contains(party) {
                signers.push(party.clone());
            }
        }

        let mut sessions: Vec<Session> = Vec::with_capacity(signers.len());
        for party in signers {
            let mut session = ctx.messenger().open(party.clone());
            debug!(tx = %stx.id(), party = %party.short(), "collecting transfer signature");
            if let Err(err) = request_signature(ctx, &mut session, &mut stx).await {
                abort_sessions(&sessions, &format!("signature round with {party} failed: {err}")).await;
                return Err(err);
            }
            sessions.push(session);
        }

        self.progress.advance(FlowStage::Notarising);
        let stx = finalise(ctx, stx, std::slice::from_ref(&consumed), &sessions).await?;
        info!(
            tx = %stx.id(),
            linear_id = %consumed.state.linear_id(),
            to = %self.new_recipient.short(),
            "IOU transferred"
        );
        Ok(stx)
    }
}

/// Responder side of an IOU transfer, run by the original sender and the new recipient
pub struct TransferAcceptor;

impl TransferAcceptor {
    pub async fn run(
        ctx: &FlowContext,
        session: &mut Session,
        proposal: Proposal,
    ) -> Result<SignedTransition, FlowError> {
        let signed = respond(ctx, session, proposal, CommandKind::Transfer).await?;
        let stx = receive_finality(ctx, session, signed.id()).await?;
        info!(tx = %stx.id(), from = %session.counterparty().short(), "accepted transfer");
        Ok(stx)
    }
}
