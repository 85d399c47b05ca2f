// In-process network connecting parties through unbounded channels

use crate::identity::Did;
use crate::transport::traits::{StatsCounters, Transport, TransportError, TransportStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// Receiving end of a party's inbox
pub type Inbox = mpsc::UnboundedReceiver<Vec<u8>>;

/// A network where every attached party has one inbox of raw frames
#[derive(Default)]
pub struct MemoryNetwork {
    peers: RwLock<HashMap<Did, mpsc::UnboundedSender<Vec<u8>>>>,
    stats: StatsCounters,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a party, replacing any previous inbox it had
    pub fn attach(&self, party: &Did) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut peers) = self.peers.write() {
            peers.insert(party.clone(), tx);
        }
        debug!(party = %party.short(), "attached to network");
        rx
    }

    /// Detach a party; frames sent to it afterwards fail as unreachable
    pub fn detach(&self, party: &Did) {
        if let Ok(mut peers) = self.peers.write() {
            peers.remove(party);
        }
        debug!(party = %party.short(), "detached from network");
    }

    pub fn is_attached(&self, party: &Did) -> bool {
        self.peers
            .read()
            .map(|p| p.contains_key(party))
            .unwrap_or(false)
    }

    pub fn party_count(&self) -> usize {
        self.peers.read().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MemoryNetwork {
    async fn send(&self, to: &Did, frame: Vec<u8>) -> Result<(), TransportError> {
        let sender = self
            .peers
            .read()
            .ok()
            .and_then(|p| p.get(to).cloned());

        let len = frame.len();
        let delivered = match sender {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        };
        if !delivered {
            self.stats.record_failure();
            return Err(TransportError::Unreachable(to.clone()));
        }
        self.stats.record_sent(len);
        Ok(())
    }

    fn stats(&self) -> TransportStats {
        self.stats.snapshot()
    }
}
