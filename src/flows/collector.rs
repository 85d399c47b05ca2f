// Signature Collector - the two-party signing sub-protocol
//
// Requester: send the partially signed transition, serve any ancestry the
// responder asks for, then wait for a terminal reply.
// Responder: check signatures, resolve inputs, re-run the contract, and
// always answer with a signature or a structured rejection.

use crate::contract::CommandKind;
use crate::flows::progress::{CollectorState, SignatureRound};
use crate::flows::resolver::DependencyResolver;
use crate::flows::{FlowContext, FlowError};
use crate::identity::{Did, TransactionSignature};
use crate::transition::{SignedTransition, TransitionId};
use crate::transport::{Message, Proposal, Session, SignatureReply};
use tracing::{debug, info, warn};

/// Ask the session's counterparty to co-sign `stx`
///
/// On success the returned signature has already been appended to `stx`.
pub async fn request_signature(
    ctx: &FlowContext,
    session: &mut Session,
    stx: &mut SignedTransition,
) -> Result<TransactionSignature, FlowError> {
    let party = session.counterparty().clone();
    let mut round = SignatureRound::new();

    let proposal = Proposal {
        kind: stx.transition().command().kind(),
        transition: stx.clone(),
    };
    session
        .send(Message::Proposal(proposal))
        .await
        .map_err(|e| FlowError::from_transport(&party, e))?;
    debug!(tx = %stx.id(), party = %party.short(), "signature requested");

    loop {
        let message = session
            .receive()
            .await
            .map_err(|e| FlowError::from_transport(&party, e))?;
        if round.state() == CollectorState::Sent {
            round.advance(CollectorState::Validating);
        }

        match message {
            Message::FetchTransactions(ids) => serve_transactions(ctx, session, ids).await?,
            Message::SignatureReply(SignatureReply::Signed(sig)) => {
                if sig.by != party {
                    round.finish(CollectorState::Rejected);
                    return Err(FlowError::InvalidSignature(format!(
                        "{party} replied with a signature claimed by {}",
                        sig.by
                    )));
                }
                stx.add_signature(sig.clone())?;
                round.finish(CollectorState::Signed);
                info!(tx = %stx.id(), party = %party.short(), "signature received");
                return Ok(sig);
            }
            Message::SignatureReply(SignatureReply::Rejected(reason)) => {
                round.finish(CollectorState::Rejected);
                warn!(tx = %stx.id(), party = %party.short(), reason = %reason, "counterparty rejected");
                return Err(FlowError::CounterpartyRejected { party, reason });
            }
            other => {
                return Err(FlowError::ProtocolViolation {
                    party,
                    reason: format!("unexpected {} while awaiting a signature", other.message_type()),
                });
            }
        }
    }
}

/// Answer an ancestry request from the committed ledger
async fn serve_transactions(
    ctx: &FlowContext,
    session: &Session,
    ids: Vec<TransitionId>,
) -> Result<(), FlowError> {
    let party = session.counterparty();
    if ids.len() > ctx.config().max_dependencies {
        return Err(FlowError::ProtocolViolation {
            party: party.clone(),
            reason: format!("requested {} transitions at once", ids.len()),
        });
    }

    let mut found = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(stx) = ctx.store().get_transaction(id)? {
            found.push(stx);
        }
    }
    debug!(party = %party.short(), requested = ids.len(), served = found.len(), "serving ancestry");
    session
        .send(Message::Transactions(found))
        .await
        .map_err(|e| FlowError::from_transport(party, e))
}

/// Validate a received proposal and reply with our signature or a rejection
///
/// Returns the transition with our signature attached. It is transient: it
/// is only recorded once the finalised form arrives.
pub async fn respond(
    ctx: &FlowContext,
    session: &mut Session,
    proposal: Proposal,
    expected: CommandKind,
) -> Result<SignedTransition, FlowError> {
    let party = session.counterparty().clone();
    let mut round = SignatureRound::new();
    round.advance(CollectorState::Validating);

    let mut stx = proposal.transition;
    let id = stx.id();

    if let Err(err) = check_proposal(ctx, session, &stx, proposal.kind, expected).await {
        round.finish(CollectorState::Rejected);
        warn!(tx = %id, party = %party.short(), error = %err, "rejecting proposal");
        if let Err(e) = session
            .send(Message::SignatureReply(SignatureReply::Rejected(err.to_string())))
            .await
        {
            warn!(tx = %id, error = %e, "could not deliver rejection");
        }
        return Err(err);
    }

    let sig = ctx.sign(&mut stx);
    session
        .send(Message::SignatureReply(SignatureReply::Signed(sig)))
        .await
        .map_err(|e| FlowError::from_transport(&party, e))?;
    round.finish(CollectorState::Signed);
    info!(tx = %id, party = %party.short(), "signed proposal");
    Ok(stx)
}

async fn check_proposal(
    ctx: &FlowContext,
    session: &mut Session,
    stx: &SignedTransition,
    kind: CommandKind,
    expected: CommandKind,
) -> Result<(), FlowError> {
    let party = session.counterparty().clone();
    let tx = stx.transition();

    if kind != expected || tx.command().kind() != expected {
        return Err(FlowError::ProtocolViolation {
            party,
            reason: format!("expected a {expected} proposal, got {kind} carrying {}", tx.command().kind()),
        });
    }
    if tx.notary() != ctx.notary_identity() {
        return Err(FlowError::ProtocolViolation {
            party,
            reason: format!("untrusted notary {}", tx.notary()),
        });
    }
    if !tx.command().signers().contains(ctx.me()) {
        return Err(FlowError::ProtocolViolation {
            party,
            reason: "this node is not a required signer".to_string(),
        });
    }
    if expected == CommandKind::Create && tx.outputs().iter().any(|s| s.sender() != &party) {
        return Err(FlowError::ProtocolViolation {
            party,
            reason: "a new IOU must be proposed by its sender".to_string(),
        });
    }
    if stx.has_signature_from(ctx.me()) {
        return Err(FlowError::ProtocolViolation {
            party,
            reason: "proposal already carries this node's signature".to_string(),
        });
    }
    if !stx.has_signature_from(&party) {
        return Err(FlowError::InvalidSignature(format!("proposal is not signed by requester {party}")));
    }

    let missing = stx.missing_signatures();
    let allowed: Vec<&Did> = missing.iter().collect();
    stx.verify_signatures_except(&allowed)?;

    let dependencies: Vec<TransitionId> = tx.inputs().iter().map(|r| r.txid).collect();
    DependencyResolver::new(ctx).resolve(session, dependencies).await?;

    // Consumption is not checked here; the notary alone decides uniqueness
    let ledger_tx = tx.resolve(ctx.resolve_inputs(tx)?)?;
    ledger_tx.verify()?;
    Ok(())
}
