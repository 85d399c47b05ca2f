// Dependency Resolver - fetch and verify missing ancestry before signing
//
// Ancestors are requested breadth-first from the proposer, verified as a
// batch (notary signature, full signature set, contract) and only then
// recorded. Nothing unverified ever reaches the committed ledger.

use crate::flows::{FlowContext, FlowError};
use crate::identity::Did;
use crate::storage::LedgerStore;
use crate::transition::{SignedTransition, StateAndRef, StateRef, TransitionId};
use crate::transport::{Message, MessageType, Session};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, info, warn};

pub struct DependencyResolver<'a> {
    ctx: &'a FlowContext,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(ctx: &'a FlowContext) -> Self {
        Self { ctx }
    }

    /// Make every transition in `ids`, and its ancestry, available locally
    ///
    /// Returns the number of transitions fetched and recorded.
    pub async fn resolve(&self, session: &mut Session, ids: Vec<TransitionId>) -> Result<usize, FlowError> {
        let store = self.ctx.store();
        let limit = self.ctx.config().max_dependencies;

        let mut fetched: BTreeMap<TransitionId, SignedTransition> = BTreeMap::new();
        let mut queue: VecDeque<TransitionId> = VecDeque::new();
        let mut seen: BTreeSet<TransitionId> = BTreeSet::new();
        for id in ids {
            if seen.insert(id) && !store.has_transaction(&id)? {
                queue.push_back(id);
            }
        }
        if queue.is_empty() {
            return Ok(0);
        }

        while !queue.is_empty() {
            let wanted: Vec<TransitionId> = queue.drain(..).collect();
            if fetched.len() + wanted.len() > limit {
                return Err(FlowError::UnresolvableDependency(format!(
                    "ancestry exceeds {limit} transitions"
                )));
            }
            debug!(party = %session.counterparty().short(), count = wanted.len(), "fetching ancestry");

            let batch = self.fetch(session, &wanted).await?;
            for stx in batch {
                for input in stx.transition().inputs() {
                    let parent = input.txid;
                    if seen.insert(parent) && !store.has_transaction(&parent)? {
                        queue.push_back(parent);
                    }
                }
                fetched.insert(stx.id(), stx);
            }
        }

        let ordered = verify_dependencies(store, self.ctx.notary_identity(), fetched.into_values().collect())?;
        let count = ordered.len();
        for stx in &ordered {
            self.ctx.record(stx).map_err(|e| match e {
                FlowError::DoubleSpend {
                    state_ref,
                    consumed_by,
                } => FlowError::UnresolvableDependency(format!(
                    "ancestor {} spends {state_ref}, already consumed by {consumed_by}",
                    stx.id()
                )),
                other => other,
            })?;
        }
        info!(party = %session.counterparty().short(), count, "ancestry resolved");
        Ok(count)
    }

    async fn fetch(&self, session: &mut Session, wanted: &[TransitionId]) -> Result<Vec<SignedTransition>, FlowError> {
        let party = session.counterparty().clone();
        let unobtainable = |reason: String| {
            FlowError::UnresolvableDependency(format!("could not fetch ancestry from {party}: {reason}"))
        };

        session
            .send(Message::FetchTransactions(wanted.to_vec()))
            .await
            .map_err(|e| unobtainable(e.to_string()))?;
        let reply = session
            .receive_expected(MessageType::Transactions)
            .await
            .map_err(|e| unobtainable(e.to_string()))?;
        let Message::Transactions(batch) = reply else {
            return Err(unobtainable("malformed reply".to_string()));
        };

        let mut returned: BTreeMap<TransitionId, SignedTransition> = BTreeMap::new();
        for stx in batch {
            let id = stx.id();
            if !wanted.contains(&id) {
                warn!(tx = %id, party = %party.short(), "ignoring unrequested transition");
                continue;
            }
            returned.insert(id, stx);
        }
        if let Some(missing) = wanted.iter().find(|id| !returned.contains_key(id)) {
            return Err(unobtainable(format!("transition {missing} not provided")));
        }
        Ok(returned.into_values().collect())
    }
}

/// Verify fetched ancestry and order it parents-first
///
/// Each candidate must name `notary`, carry every required signature
/// including the notary's, spend only states that are held locally or
/// produced by another candidate, and satisfy the contract.
pub fn verify_dependencies(
    store: &dyn LedgerStore,
    notary: &Did,
    candidates: Vec<SignedTransition>,
) -> Result<Vec<SignedTransition>, FlowError> {
    let mut pending: HashMap<TransitionId, SignedTransition> =
        candidates.into_iter().map(|stx| (stx.id(), stx)).collect();
    let mut produced: HashMap<StateRef, StateAndRef> = HashMap::new();
    let mut ordered = Vec::with_capacity(pending.len());

    for stx in pending.values() {
        let id = stx.id();
        if stx.transition().notary() != notary {
            return Err(FlowError::UnresolvableDependency(format!(
                "ancestor {id} names untrusted notary {}",
                stx.transition().notary()
            )));
        }
        stx.verify_fully_signed().map_err(|e| {
            FlowError::UnresolvableDependency(format!("ancestor {id} is not final: {e}"))
        })?;
    }

    while !pending.is_empty() {
        let ready: Vec<TransitionId> = pending
            .iter()
            .filter(|(_, stx)| {
                stx.transition()
                    .inputs()
                    .iter()
                    .all(|r| !pending.contains_key(&r.txid))
            })
            .map(|(id, _)| *id)
            .collect();
        if ready.is_empty() {
            return Err(FlowError::UnresolvableDependency("ancestry contains a cycle".to_string()));
        }

        let mut ready = ready;
        ready.sort();
        for id in ready {
            let Some(stx) = pending.remove(&id) else { continue };
            let tx = stx.transition();

            let mut inputs = Vec::with_capacity(tx.inputs().len());
            for r in tx.inputs() {
                let state = match produced.get(r) {
                    Some(s) => Some(s.clone()),
                    None => store.get_state(r)?,
                };
                inputs.push(state.ok_or_else(|| {
                    FlowError::UnresolvableDependency(format!("ancestor {id} spends unknown state {r}"))
                })?);
            }

            tx.resolve(inputs)
                .map_err(|e| FlowError::UnresolvableDependency(format!("ancestor {id}: {e}")))?
                .verify()
                .map_err(|e| FlowError::UnresolvableDependency(format!("ancestor {id}: {e}")))?;

            for out in tx.output_refs() {
                produced.insert(out.reference, out);
            }
            ordered.push(stx);
        }
    }
    Ok(ordered)
}
