// Node runtime - one party's flows, ledger and inbound dispatch

use crate::contract::{CommandKind, LinearId};
use crate::flows::{
    record_late_finality, AgreementAcceptor, AgreementFlow, FlowContext, FlowError, TransferAcceptor, TransferFlow,
};
use crate::identity::{Did, Keypair};
use crate::node::config::{ConfigError, NodeConfig};
use crate::notary::Notary;
use crate::storage::LedgerStore;
use crate::transition::{SignedTransition, StateAndRef, StateRef, TransitionId};
use crate::transport::{Inbox, Message, Messenger, Routed, Session, Transport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A ledger party: identity, committed ledger, and the flows it can run
#[derive(Clone)]
pub struct Node {
    ctx: Arc<FlowContext>,
}

impl Node {
    pub fn new(
        config: NodeConfig,
        keypair: Keypair,
        store: Arc<dyn LedgerStore>,
        notary: Arc<dyn Notary>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let messenger = Messenger::new(keypair.did(), transport, config.session_timeout());
        let ctx = FlowContext::new(config, keypair, notary, store, messenger);
        Ok(Self { ctx: Arc::new(ctx) })
    }

    pub fn did(&self) -> &Did {
        self.ctx.me()
    }

    pub fn name(&self) -> &str {
        &self.ctx.config().name
    }

    pub fn context(&self) -> &Arc<FlowContext> {
        &self.ctx
    }

    /// Start dispatching inbound frames to sessions and acceptor flows
    pub fn spawn(&self, mut inbox: Inbox) -> JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            while let Some(frame) = inbox.recv().await {
                match ctx.messenger().route(&frame) {
                    Ok(Routed::Inbound(session)) => {
                        tokio::spawn(handle_inbound(Arc::clone(&ctx), session));
                    }
                    Ok(Routed::Delivered) => {}
                    Ok(Routed::Dropped) => debug!(node = %ctx.config().name, "frame dropped"),
                    Err(e) => warn!(node = %ctx.config().name, error = %e, "undecodable frame"),
                }
            }
            debug!(node = %ctx.config().name, "inbox closed");
        })
    }

    /// Originate an IOU of `value` owed by this node to `counterparty`
    pub async fn create_iou(&self, value: i64, counterparty: &Did) -> Result<SignedTransition, FlowError> {
        AgreementFlow::new(&self.ctx, value, counterparty.clone()).run().await
    }

    /// Reassign an IOU this node holds to `new_recipient`
    pub async fn transfer_iou(&self, state_ref: &StateRef, new_recipient: &Did) -> Result<SignedTransition, FlowError> {
        TransferFlow::new(&self.ctx, *state_ref, new_recipient.clone()).run().await
    }

    /// Unconsumed IOUs this node is a participant in
    pub fn list_states(&self) -> Result<Vec<StateAndRef>, FlowError> {
        Ok(self.ctx.store().relevant_states(self.did())?)
    }

    /// Latest version of the IOU with `linear_id`, if held
    pub fn find_by_linear_id(&self, linear_id: &LinearId) -> Result<Option<StateAndRef>, FlowError> {
        Ok(self
            .list_states()?
            .into_iter()
            .find(|s| s.state.linear_id() == linear_id))
    }

    /// Wait for transition `id` to be recorded locally, bounded by the finality wait
    pub async fn wait_for_transaction(&self, id: &TransitionId) -> Option<SignedTransition> {
        self.ctx.wait_for_transaction(id).await
    }
}

async fn handle_inbound(ctx: Arc<FlowContext>, mut session: Session) {
    let node = ctx.config().name.clone();
    let party = session.counterparty().clone();

    let proposal = match session.receive().await {
        Ok(Message::Proposal(proposal)) => proposal,
        Ok(Message::Finalised(stx)) => {
            if let Err(e) = record_late_finality(&ctx, &party, stx) {
                warn!(node = %node, party = %party.short(), error = %e, "refusing late finalised transition");
            }
            return;
        }
        Ok(other) => {
            debug!(node = %node, party = %party.short(), kind = %other.message_type(), "ignoring stray message");
            return;
        }
        Err(e) => {
            warn!(node = %node, party = %party.short(), error = %e, "inbound session failed");
            return;
        }
    };

    let outcome = match proposal.kind {
        CommandKind::Create => AgreementAcceptor::run(&ctx, &mut session, proposal).await,
        CommandKind::Transfer => TransferAcceptor::run(&ctx, &mut session, proposal).await,
    };
    match outcome {
        Ok(stx) => info!(node = %node, tx = %stx.id(), party = %party.short(), "inbound flow completed"),
        Err(e) => warn!(node = %node, party = %party.short(), error = %e, "inbound flow failed"),
    }
}
