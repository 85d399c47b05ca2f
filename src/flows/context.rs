use crate::flows::FlowError;
use crate::identity::{Did, Keypair, TransactionSignature};
use crate::node::NodeConfig;
use crate::notary::Notary;
use crate::storage::{LedgerStore, StoreError};
use crate::transition::{SignedTransition, StateAndRef, Transition, TransitionId};
use crate::transport::Messenger;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Everything a flow needs from its node
pub struct FlowContext {
    config: NodeConfig,
    keypair: Keypair,
    me: Did,
    notary: Arc<dyn Notary>,
    notary_identity: Did,
    store: Arc<dyn LedgerStore>,
    messenger: Arc<Messenger>,
    recorded: Notify,
}

impl FlowContext {
    pub fn new(
        config: NodeConfig,
        keypair: Keypair,
        notary: Arc<dyn Notary>,
        store: Arc<dyn LedgerStore>,
        messenger: Arc<Messenger>,
    ) -> Self {
        let me = keypair.did();
        let notary_identity = notary.identity();
        Self {
            config,
            keypair,
            me,
            notary,
            notary_identity,
            store,
            messenger,
            recorded: Notify::new(),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn me(&self) -> &Did {
        &self.me
    }

    /// The notary this node trusts to finalise transitions
    pub fn notary_identity(&self) -> &Did {
        &self.notary_identity
    }

    pub fn notary(&self) -> &Arc<dyn Notary> {
        &self.notary
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn messenger(&self) -> &Arc<Messenger> {
        &self.messenger
    }

    /// Sign a transition with this node's key
    pub fn sign(&self, stx: &mut SignedTransition) -> TransactionSignature {
        stx.sign(&self.keypair)
    }

    /// Look up every input of `tx` in the committed ledger
    pub fn resolve_inputs(&self, tx: &Transition) -> Result<Vec<StateAndRef>, FlowError> {
        tx.inputs()
            .iter()
            .map(|r| {
                self.store.get_state(r)?.ok_or_else(|| {
                    FlowError::UnresolvableDependency(format!("input {r} not held locally"))
                })
            })
            .collect()
    }

    /// Persist a finalised transition and wake anyone waiting for it
    pub fn record(&self, stx: &SignedTransition) -> Result<(), FlowError> {
        self.store.put(stx).map_err(|e| match e {
            StoreError::AlreadyConsumed {
                state_ref,
                consumed_by,
            } => FlowError::DoubleSpend {
                state_ref,
                consumed_by,
            },
            other => FlowError::Storage(other),
        })?;
        info!(node = %self.config.name, tx = %stx.id(), "recorded transition");
        self.recorded.notify_waiters();
        Ok(())
    }

    /// Wait until transition `id` is in the committed ledger
    pub async fn wait_for_transaction(&self, id: &TransitionId) -> Option<SignedTransition> {
        let wait = async {
            loop {
                let notified = self.recorded.notified();
                if let Ok(Some(stx)) = self.store.get_transaction(id) {
                    return stx;
                }
                notified.await;
            }
        };
        tokio::time::timeout(self.config.finality_wait(), wait).await.ok()
    }
}
