// Local network - several nodes and one notary in a single process

use crate::identity::Keypair;
use crate::node::config::{ConfigError, NodeConfig};
use crate::node::runtime::Node;
use crate::notary::{Notary, NotaryConfig, UniquenessNotary};
use crate::storage::{LedgerStore, MemoryLedger};
use crate::transport::{MemoryNetwork, Transport};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// In-memory deployment used by the demo and the flow tests
pub struct LocalNetwork {
    config: NodeConfig,
    network: Arc<MemoryNetwork>,
    notary: Arc<UniquenessNotary>,
    nodes: BTreeMap<String, Node>,
    handles: Vec<JoinHandle<()>>,
}

impl LocalNetwork {
    /// Create a network with a non-validating notary
    ///
    /// `config` is the template for every node; each node gets its own name.
    pub fn new(config: NodeConfig) -> Self {
        Self::with_notary(config, NotaryConfig::default())
    }

    pub fn with_notary(config: NodeConfig, notary_config: NotaryConfig) -> Self {
        let notary = UniquenessNotary::new(Keypair::generate(), notary_config);
        Self {
            config,
            network: MemoryNetwork::new(),
            notary: Arc::new(notary),
            nodes: BTreeMap::new(),
            handles: Vec::new(),
        }
    }

    /// Add a node with a fresh key and an in-memory ledger
    pub fn add_node(&mut self, name: &str) -> Result<Node, ConfigError> {
        self.add_node_with(name, Keypair::generate(), Arc::new(MemoryLedger::new()))
    }

    /// Add a node with a given key and ledger
    pub fn add_node_with(
        &mut self,
        name: &str,
        keypair: Keypair,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Node, ConfigError> {
        if self.nodes.contains_key(name) {
            return Err(ConfigError::InvalidConfig(format!("node '{name}' already exists")));
        }

        let config = self.config.clone().with_name(name);
        let notary: Arc<dyn Notary> = self.notary.clone();
        let transport: Arc<dyn Transport> = self.network.clone();
        let node = Node::new(config, keypair, store, notary, transport)?;

        let inbox = self.network.attach(node.did());
        self.handles.push(node.spawn(inbox));
        info!(node = name, did = %node.did(), "node joined local network");

        self.nodes.insert(name.to_string(), node.clone());
        Ok(node)
    }

    pub fn network(&self) -> &Arc<MemoryNetwork> {
        &self.network
    }

    pub fn notary(&self) -> &Arc<UniquenessNotary> {
        &self.notary
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Detach every node and stop its dispatcher
    pub fn shutdown(&mut self) {
        for node in self.nodes.values() {
            self.network.detach(node.did());
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for LocalNetwork {
    fn drop(&mut self) {
        self.shutdown();
    }
}
