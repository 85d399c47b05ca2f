// Flows module - multi-party protocols that move IOUs through the ledger
//
// Every flow runs as one async task per in-flight transition. Sessions are
// the only suspension points, and nothing is recorded until the notary has
// signed.

mod agreement;
mod collector;
mod context;
mod error;
mod finality;
mod progress;
mod resolver;
mod transfer;

pub use agreement::{AgreementAcceptor, AgreementFlow};
pub use collector::{request_signature, respond};
pub use context::FlowContext;
pub use error::FlowError;
pub use finality::{abort_sessions, finalise, receive_finality, record_late_finality};
pub use progress::{CollectorState, FlowStage, ProgressTracker, SignatureRound};
pub use resolver::{verify_dependencies, DependencyResolver};
pub use transfer::{TransferAcceptor, TransferFlow};
