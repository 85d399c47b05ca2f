// Agreement Flow - originate a new IOU between two parties
//
// Initiator: build -> validate -> self-sign -> collect the counterparty's
// signature -> notarise -> record. The acceptor checks and signs, then
// waits for the finalised transition.

use crate::contract::CommandKind;
use crate::flows::collector::{request_signature, respond};
use crate::flows::finality::{finalise, receive_finality};
use crate::flows::progress::{FlowStage, ProgressTracker};
use crate::flows::{FlowContext, FlowError};
use crate::identity::Did;
use crate::transition::{SignedTransition, TransitionBuilder};
use crate::transport::{Proposal, Session};
use tracing::{info, warn};

/// Initiator side of IOU creation
pub struct AgreementFlow<'a> {
    ctx: &'a FlowContext,
    value: i64,
    counterparty: Did,
    progress: ProgressTracker,
}

impl<'a> AgreementFlow<'a> {
    pub fn new(ctx: &'a FlowContext, value: i64, counterparty: Did) -> Self {
        Self {
            ctx,
            value,
            counterparty,
            progress: ProgressTracker::new("agreement"),
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Run the flow to completion
    pub async fn run(&mut self) -> Result<SignedTransition, FlowError> {
        match self.execute().await {
            Ok(stx) => {
                self.progress.advance(FlowStage::Done);
                Ok(stx)
            }
            Err(err) => {
                warn!(error = %err, "agreement flow failed");
                self.progress.fail(err.to_string());
                Err(err)
            }
        }
    }

    async fn execute(&mut self) -> Result<SignedTransition, FlowError> {
        let ctx = self.ctx;
        let tx = TransitionBuilder::build_create(
            self.value,
            ctx.me().clone(),
            self.counterparty.clone(),
            ctx.notary_identity().clone(),
        );

        // Contract runs before anything leaves this node
        self.progress.advance(FlowStage::Verifying);
        tx.resolve(Vec::new())?.verify()?;

        self.progress.advance(FlowStage::Signing);
        let mut stx = SignedTransition::new(tx);
        ctx.sign(&mut stx);

        self.progress.advance(FlowStage::CollectingSignatures);
        let mut session = ctx.messenger().open(self.counterparty.clone());
        request_signature(ctx, &mut session, &mut stx).await?;

        self.progress.advance(FlowStage::Notarising);
        let stx = finalise(ctx, stx, &[], std::slice::from_ref(&session)).await?;
        info!(tx = %stx.id(), value = self.value, counterparty = %self.counterparty.short(), "IOU created");
        Ok(stx)
    }
}

/// Responder side of IOU creation
pub struct AgreementAcceptor;

impl AgreementAcceptor {
    /// Handle a Create proposal that opened `session`
    pub async fn run(
        ctx: &FlowContext,
        session: &mut Session,
        proposal: Proposal,
    ) -> Result<SignedTransition, FlowError> {
        let signed = respond(ctx, session, proposal, CommandKind::Create).await?;
        let stx = receive_finality(ctx, session, signed.id()).await?;
        info!(tx = %stx.id(), from = %session.counterparty().short(), "accepted IOU");
        Ok(stx)
    }
}
