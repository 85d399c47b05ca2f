// Finality - notarise, record, and distribute the final transition

use crate::flows::{FlowContext, FlowError};
use crate::identity::Did;
use crate::transition::{SignedTransition, StateAndRef, TransitionId};
use crate::transport::{Message, Session};
use tracing::{info, warn};

/// Submit a transition signed by every participant to the notary
///
/// On success the notary signature is attached, the transition is recorded
/// and every counterparty session receives the finalised form. On failure
/// the sessions are aborted and nothing is recorded.
pub async fn finalise(
    ctx: &FlowContext,
    mut stx: SignedTransition,
    inputs: &[StateAndRef],
    sessions: &[Session],
) -> Result<SignedTransition, FlowError> {
    let id = stx.id();
    let notary = ctx.notary_identity().clone();
    stx.verify_signatures_except(&[&notary])?;

    let notary_sig = match ctx.notary().notarise(&stx, inputs).await {
        Ok(sig) => sig,
        Err(err) => {
            warn!(tx = %id, error = %err, "notarisation failed");
            abort_sessions(sessions, &format!("notary rejected the transition: {err}")).await;
            return Err(FlowError::NotaryRejected(err));
        }
    };
    if notary_sig.by != notary {
        abort_sessions(sessions, "notary signed under an unexpected identity").await;
        return Err(FlowError::InvalidSignature(format!(
            "notary reply signed by {}, expected {notary}",
            notary_sig.by
        )));
    }
    stx.add_signature(notary_sig)?;
    stx.verify_fully_signed()?;

    ctx.record(&stx)?;
    for session in sessions {
        if let Err(e) = session.send(Message::Finalised(stx.clone())).await {
            warn!(tx = %id, party = %session.counterparty().short(), error = %e, "could not deliver finalised transition");
        }
    }
    info!(tx = %id, parties = sessions.len(), "transition finalised");
    Ok(stx)
}

/// Tell every counterparty the flow will not complete
pub async fn abort_sessions(sessions: &[Session], reason: &str) {
    for session in sessions {
        if let Err(e) = session.send(Message::Abort(reason.to_string())).await {
            warn!(party = %session.counterparty().short(), error = %e, "could not deliver abort");
        }
    }
}

/// Acceptor side: wait for the finalised form of `expected` and record it
pub async fn receive_finality(
    ctx: &FlowContext,
    session: &mut Session,
    expected: TransitionId,
) -> Result<SignedTransition, FlowError> {
    let party: Did = session.counterparty().clone();
    let message = session
        .receive_within(ctx.config().finality_wait())
        .await
        .map_err(|e| FlowError::from_transport(&party, e))?;

    match message {
        Message::Finalised(stx) => {
            if stx.id() != expected {
                return Err(FlowError::ProtocolViolation {
                    party,
                    reason: format!("finalised {} while {expected} was signed", stx.id()),
                });
            }
            accept_finalised(ctx, &party, &stx)?;
            Ok(stx)
        }
        Message::Abort(reason) => {
            warn!(tx = %expected, party = %party.short(), reason = %reason, "flow aborted by initiator");
            Err(FlowError::Aborted { party, reason })
        }
        other => Err(FlowError::ProtocolViolation {
            party,
            reason: format!("unexpected {} while awaiting finality", other.message_type()),
        }),
    }
}

/// Record a finalised transition that arrived after its session had closed
///
/// An acceptor whose finality wait expired still owes the ledger the final
/// form; the initiator's `Finalised` then reaches a fresh inbound session.
pub fn record_late_finality(
    ctx: &FlowContext,
    party: &Did,
    stx: SignedTransition,
) -> Result<SignedTransition, FlowError> {
    accept_finalised(ctx, party, &stx)?;
    info!(tx = %stx.id(), party = %party.short(), "recorded finality after the session closed");
    Ok(stx)
}

fn accept_finalised(ctx: &FlowContext, party: &Did, stx: &SignedTransition) -> Result<(), FlowError> {
    if stx.transition().notary() != ctx.notary_identity() {
        return Err(FlowError::ProtocolViolation {
            party: party.clone(),
            reason: format!("finalised under untrusted notary {}", stx.transition().notary()),
        });
    }
    stx.verify_fully_signed()?;
    if !stx.transition().command().signers().contains(ctx.me()) {
        return Err(FlowError::ProtocolViolation {
            party: party.clone(),
            reason: format!("finalised {} does not involve this node", stx.id()),
        });
    }
    ctx.record(stx)
}
