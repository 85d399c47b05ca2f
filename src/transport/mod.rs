// Transport module - THE WIRE
// Framed messages between parties, routed into per-flow sessions

mod memory;
mod protocol;
mod session;
mod traits;

pub use memory::{Inbox, MemoryNetwork};
pub use protocol::{
    Envelope, Message, MessageType, Proposal, ProtocolError, SessionId, SignatureReply,
    MAX_FRAME_SIZE,
};
pub use session::{Messenger, Routed, Session};
pub use traits::{Transport, TransportError, TransportStats};
