// Transport Traits and Core Types

use crate::identity::Did;
use crate::transport::protocol::{MessageType, ProtocolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors that can occur in the transport layer
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Peer unreachable: {0}")]
    Unreachable(Did),

    #[error("Session timeout")]
    Timeout,

    #[error("Session closed")]
    Closed,

    #[error("Unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage { expected: MessageType, got: MessageType },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// The counterparty cannot currently be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout | Self::Closed)
    }
}

/// Statistics for transport operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportStats {
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
}

/// Lock-free counters behind [`TransportStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TransportStats {
        TransportStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-to-point delivery of encoded frames between parties
///
/// Delivery is fire-and-forget; replies arrive through the receiving
/// party's inbox and are matched to sessions by the messenger.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: &Did, frame: Vec<u8>) -> Result<(), TransportError>;

    fn stats(&self) -> TransportStats;
}
