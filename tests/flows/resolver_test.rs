// Resolver Tests
// Tests for fetching and verifying transition ancestry

use iouledger::flows::{verify_dependencies, DependencyResolver, FlowError};
use iouledger::identity::{Did, Keypair};
use iouledger::node::{LocalNetwork, Node, NodeConfig};
use iouledger::notary::Notary;
use iouledger::storage::{LedgerStore, MemoryLedger};
use iouledger::transition::{SignedTransition, StateAndRef, StateRef, TransitionBuilder, TransitionId};
use iouledger::transport::{Message, MessageType, Messenger, Routed, Session, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Three parties and a notary identity; transitions come back signed by the parties only
struct Chain {
    a: Keypair,
    b: Keypair,
    c: Keypair,
    notary: Did,
}

impl Chain {
    fn new(notary: Did) -> Self {
        Self {
            a: Keypair::generate(),
            b: Keypair::generate(),
            c: Keypair::generate(),
            notary,
        }
    }

    fn create(&self) -> SignedTransition {
        let tx = TransitionBuilder::build_create(10, self.a.did(), self.b.did(), self.notary.clone());
        let mut stx = SignedTransition::new(tx);
        stx.sign(&self.a);
        stx.sign(&self.b);
        stx
    }

    /// Transfer of `create`'s output from b to c
    fn transfer(&self, create: &SignedTransition) -> (SignedTransition, StateAndRef) {
        let consumed = create.transition().output_refs().remove(0);
        let tx = TransitionBuilder::new(self.notary.clone())
            .input(consumed.reference)
            .output(consumed.state.with_recipient(self.c.did()))
            .command(iouledger::contract::Command::Transfer {
                signers: vec![self.a.did(), self.b.did(), self.c.did()],
            })
            .build()
            .unwrap();
        let mut stx = SignedTransition::new(tx);
        for kp in [&self.a, &self.b, &self.c] {
            stx.sign(kp);
        }
        (stx, consumed)
    }
}

async fn notarised(net: &LocalNetwork, mut stx: SignedTransition, inputs: &[StateAndRef]) -> SignedTransition {
    let sig = net.notary().notarise(&stx, inputs).await.unwrap();
    stx.add_signature(sig).unwrap();
    stx
}

/// A scripted peer on the same in-memory network
struct Peer {
    did: Did,
    _messenger: Arc<Messenger>,
    inbound: mpsc::UnboundedReceiver<Session>,
}

fn peer(net: &LocalNetwork) -> Peer {
    let did = Keypair::generate().did();
    let transport: Arc<dyn Transport> = net.network().clone();
    let messenger = Messenger::new(did.clone(), transport, Duration::from_millis(500));
    let mut inbox = net.network().attach(&did);
    let (tx, inbound) = mpsc::unbounded_channel();
    let router = messenger.clone();
    tokio::spawn(async move {
        while let Some(frame) = inbox.recv().await {
            if let Ok(Routed::Inbound(session)) = router.route(&frame) {
                let _ = tx.send(session);
            }
        }
    });
    Peer {
        did,
        _messenger: messenger,
        inbound,
    }
}

/// Answer every fetch on the next inbound session from `served`
async fn serve(peer: &mut Peer, served: Vec<SignedTransition>) {
    let Some(mut session) = peer.inbound.recv().await else {
        return;
    };
    while let Ok(Message::FetchTransactions(ids)) =
        session.receive_expected(MessageType::FetchTransactions).await
    {
        let reply: Vec<SignedTransition> = served
            .iter()
            .filter(|s| ids.contains(&s.id()))
            .cloned()
            .collect();
        if session.send(Message::Transactions(reply)).await.is_err() {
            break;
        }
    }
}

fn network(config: NodeConfig) -> (LocalNetwork, Node) {
    let mut net = LocalNetwork::new(config.with_session_timeout(1));
    let node = net.add_node("verifier").unwrap();
    (net, node)
}

async fn resolve_from(
    node: &Node,
    peer: &mut Peer,
    ids: Vec<TransitionId>,
    served: Vec<SignedTransition>,
) -> Result<usize, FlowError> {
    let ctx = node.context();
    let mut session = ctx.messenger().open(peer.did.clone());
    let resolver = DependencyResolver::new(ctx);
    let (result, ()) = tokio::join!(
        resolver.resolve(&mut session, ids),
        serve(peer, served)
    );
    result
}

// ============================================================================
// END-TO-END RESOLUTION
// ============================================================================

/// Test: a two-deep chain is fetched transitively and recorded parents-first
#[tokio::test]
async fn test_resolves_transitive_ancestry() {
    let (net, node) = network(NodeConfig::new());
    let mut peer = peer(&net);
    let chain = Chain::new(node.context().notary_identity().clone());
    let create = notarised(&net, chain.create(), &[]).await;
    let (transfer, consumed) = chain.transfer(&create);
    let transfer = notarised(&net, transfer, &[consumed]).await;

    let fetched = resolve_from(
        &node,
        &mut peer,
        vec![transfer.id()],
        vec![create.clone(), transfer.clone()],
    )
    .await
    .unwrap();

    assert_eq!(fetched, 2);
    let store = node.context().store();
    assert!(store.has_transaction(&create.id()).unwrap());
    assert!(store.has_transaction(&transfer.id()).unwrap());
    assert_eq!(
        store.consumed_by(&StateRef::new(create.id(), 0)).unwrap(),
        Some(transfer.id())
    );
}

#[tokio::test]
async fn test_nothing_fetched_when_held() {
    let (net, node) = network(NodeConfig::new());
    let mut peer = peer(&net);
    let chain = Chain::new(node.context().notary_identity().clone());
    let create = notarised(&net, chain.create(), &[]).await;
    node.context().record(&create).unwrap();

    let ctx = node.context();
    let mut session = ctx.messenger().open(peer.did.clone());
    let fetched = DependencyResolver::new(ctx)
        .resolve(&mut session, vec![create.id()])
        .await
        .unwrap();
    assert_eq!(fetched, 0);
    assert!(peer.inbound.try_recv().is_err());
}

/// Test: an ancestor without the notary's signature is never accepted
#[tokio::test]
async fn test_unnotarised_ancestor_unresolvable() {
    let (net, node) = network(NodeConfig::new());
    let mut peer = peer(&net);
    let chain = Chain::new(node.context().notary_identity().clone());
    let create = chain.create();

    let result = resolve_from(&node, &mut peer, vec![create.id()], vec![create.clone()]).await;
    match result {
        Err(FlowError::UnresolvableDependency(reason)) => {
            assert!(reason.contains("not final"), "{reason}")
        }
        other => panic!("expected UnresolvableDependency, got {other:?}"),
    }
    assert_eq!(node.context().store().transaction_count().unwrap(), 0);
}

#[tokio::test]
async fn test_withheld_ancestor_unresolvable() {
    let (net, node) = network(NodeConfig::new());
    let mut peer = peer(&net);
    let chain = Chain::new(node.context().notary_identity().clone());
    let create = notarised(&net, chain.create(), &[]).await;
    let (transfer, consumed) = chain.transfer(&create);
    let transfer = notarised(&net, transfer, &[consumed]).await;

    // The peer serves the transfer but not the create it spends
    let result = resolve_from(&node, &mut peer, vec![transfer.id()], vec![transfer.clone()]).await;
    match result {
        Err(FlowError::UnresolvableDependency(reason)) => {
            assert!(reason.contains("not provided"), "{reason}")
        }
        other => panic!("expected UnresolvableDependency, got {other:?}"),
    }
    assert!(!node.context().store().has_transaction(&transfer.id()).unwrap());
}

#[tokio::test]
async fn test_ancestry_limit() {
    let (net, node) = network(NodeConfig::new().with_max_dependencies(1));
    let peer = peer(&net);
    let chain = Chain::new(node.context().notary_identity().clone());
    let one = chain.create();
    let two = chain.create();

    let ctx = node.context();
    let mut session = ctx.messenger().open(peer.did.clone());
    let result = DependencyResolver::new(ctx)
        .resolve(&mut session, vec![one.id(), two.id()])
        .await;
    assert!(matches!(result, Err(FlowError::UnresolvableDependency(r)) if r.contains("exceeds")));
}

// ============================================================================
// BATCH VERIFICATION
// ============================================================================

fn notary_signed(notary: &Keypair, mut stx: SignedTransition) -> SignedTransition {
    stx.sign(notary);
    stx
}

#[test]
fn test_verify_orders_parents_first() {
    let notary = Keypair::generate();
    let chain = Chain::new(notary.did());
    let create = notary_signed(&notary, chain.create());
    let transfer = notary_signed(&notary, chain.transfer(&create).0);
    let store = MemoryLedger::new();

    let ordered =
        verify_dependencies(&store, &notary.did(), vec![transfer.clone(), create.clone()]).unwrap();
    assert_eq!(ordered, vec![create, transfer]);
}

#[test]
fn test_verify_rejects_untrusted_notary() {
    let notary = Keypair::generate();
    let chain = Chain::new(notary.did());
    let create = notary_signed(&notary, chain.create());
    let store = MemoryLedger::new();
    let other = Keypair::generate().did();

    let result = verify_dependencies(&store, &other, vec![create]);
    assert!(matches!(result, Err(FlowError::UnresolvableDependency(r)) if r.contains("untrusted notary")));
}

#[test]
fn test_verify_rejects_unknown_input() {
    let notary = Keypair::generate();
    let chain = Chain::new(notary.did());
    let create = notary_signed(&notary, chain.create());
    let transfer = notary_signed(&notary, chain.transfer(&create).0);
    let store = MemoryLedger::new();

    let result = verify_dependencies(&store, &notary.did(), vec![transfer]);
    assert!(matches!(result, Err(FlowError::UnresolvableDependency(r)) if r.contains("unknown state")));
}

/// Test: an ancestor breaking the contract is rejected even when fully signed
#[test]
fn test_verify_runs_contract() {
    let notary = Keypair::generate();
    let chain = Chain::new(notary.did());
    let tx = TransitionBuilder::build_create(-4, chain.a.did(), chain.b.did(), notary.did());
    let mut bad = SignedTransition::new(tx);
    for kp in [&chain.a, &chain.b, &notary] {
        bad.sign(kp);
    }
    let store = MemoryLedger::new();

    let result = verify_dependencies(&store, &notary.did(), vec![bad]);
    assert!(matches!(result, Err(FlowError::UnresolvableDependency(r)) if r.contains("non-negative")));
}

#[test]
fn test_verify_uses_locally_held_inputs() {
    let notary = Keypair::generate();
    let chain = Chain::new(notary.did());
    let create = notary_signed(&notary, chain.create());
    let transfer = notary_signed(&notary, chain.transfer(&create).0);
    let store = MemoryLedger::new();
    store.put(&create).unwrap();

    let ordered = verify_dependencies(&store, &notary.did(), vec![transfer.clone()]).unwrap();
    assert_eq!(ordered, vec![transfer]);
}
