// Sessions - per-flow conversations multiplexed over one transport
//
// A Messenger owns the routing table of a single party. Each open Session
// has its own channel, so independent flows suspend and resume without
// seeing each other's messages.

use crate::identity::Did;
use crate::transport::protocol::{Envelope, Message, MessageType, ProtocolError, SessionId};
use crate::transport::traits::{Transport, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct SessionSlot {
    counterparty: Did,
    tx: mpsc::UnboundedSender<Message>,
}

/// Outcome of routing one inbound frame
pub enum Routed {
    /// Handed to an open session
    Delivered,
    /// First message of a session the counterparty started
    Inbound(Session),
    /// Not deliverable (closed session or spoofed sender)
    Dropped,
}

/// Session routing table for one party
pub struct Messenger {
    me: Did,
    transport: Arc<dyn Transport>,
    sessions: Mutex<HashMap<SessionId, SessionSlot>>,
    timeout: Duration,
}

impl Messenger {
    pub fn new(me: Did, transport: Arc<dyn Transport>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            me,
            transport,
            sessions: Mutex::new(HashMap::new()),
            timeout,
        })
    }

    pub fn me(&self) -> &Did {
        &self.me
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a new session with `counterparty`
    pub fn open(self: &Arc<Self>, counterparty: Did) -> Session {
        let session = self.register(SessionId::generate(), counterparty);
        debug!(session = %session.id, counterparty = %session.counterparty.short(), "session opened");
        session
    }

    fn register(self: &Arc<Self>, id: SessionId, counterparty: Did) -> Session {
        let (tx, inbox) = mpsc::unbounded_channel();
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(
                id,
                SessionSlot {
                    counterparty: counterparty.clone(),
                    tx,
                },
            );
        }
        Session {
            id,
            counterparty,
            messenger: Arc::clone(self),
            inbox,
        }
    }

    /// Dispatch one inbound frame to its session
    pub fn route(self: &Arc<Self>, frame: &[u8]) -> Result<Routed, ProtocolError> {
        let Envelope {
            session,
            sender,
            message,
        } = Envelope::from_bytes(frame)?;

        {
            let sessions = self.sessions.lock().map_err(|_| {
                ProtocolError::DeserializationFailed("session table poisoned".into())
            })?;
            if let Some(slot) = sessions.get(&session) {
                if slot.counterparty != sender {
                    warn!(session = %session, sender = %sender.short(), "dropping frame from unexpected sender");
                    return Ok(Routed::Dropped);
                }
                return Ok(if slot.tx.send(message).is_ok() {
                    Routed::Delivered
                } else {
                    Routed::Dropped
                });
            }
        }

        let inbound = self.register(session, sender);
        if let Ok(sessions) = self.sessions.lock() {
            if let Some(slot) = sessions.get(&session) {
                let _ = slot.tx.send(message);
            }
        }
        debug!(session = %session, counterparty = %inbound.counterparty.short(), "inbound session");
        Ok(Routed::Inbound(inbound))
    }

    /// Number of sessions currently open
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn close(&self, id: &SessionId) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(id);
        }
    }
}

/// One side of a two-party conversation
///
/// The only suspension points of a flow are [`Session::receive`] and its
/// wrappers; every wait is bounded by the messenger's timeout.
pub struct Session {
    id: SessionId,
    counterparty: Did,
    messenger: Arc<Messenger>,
    inbox: mpsc::UnboundedReceiver<Message>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn counterparty(&self) -> &Did {
        &self.counterparty
    }

    pub async fn send(&self, message: Message) -> Result<(), TransportError> {
        let envelope = Envelope {
            session: self.id,
            sender: self.messenger.me.clone(),
            message,
        };
        let frame = envelope.to_bytes()?;
        self.messenger.transport.send(&self.counterparty, frame).await
    }

    /// Wait for the next message from the counterparty
    pub async fn receive(&mut self) -> Result<Message, TransportError> {
        let timeout = self.messenger.timeout;
        self.receive_within(timeout).await
    }

    /// Like [`Session::receive`] with an explicit bound on the wait
    pub async fn receive_within(&mut self, timeout: Duration) -> Result<Message, TransportError> {
        match tokio::time::timeout(timeout, self.inbox.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => {
                warn!(session = %self.id, counterparty = %self.counterparty.short(), "session timed out");
                Err(TransportError::Timeout)
            }
        }
    }

    /// Wait for a message of a specific type
    pub async fn receive_expected(&mut self, expected: MessageType) -> Result<Message, TransportError> {
        let message = self.receive().await?;
        let got = message.message_type();
        if got != expected {
            return Err(TransportError::UnexpectedMessage { expected, got });
        }
        Ok(message)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.messenger.close(&self.id);
    }
}
