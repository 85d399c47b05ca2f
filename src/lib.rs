//! Multi-party IOU ledger
//!
//! Parties originate and transfer IOUs by building transitions, collecting
//! each participant's signature over the transition id, and finalising
//! through a uniqueness notary. Only fully signed, notarised transitions are
//! ever recorded.

pub mod contract;
pub mod flows;
pub mod identity;
pub mod node;
pub mod notary;
pub mod storage;
pub mod transition;
pub mod transport;
