// Contract module - IOU states and the rules a transition must satisfy

mod command;
mod state;
mod validator;

pub use command::{Command, CommandKind};
pub use state::{IOUState, LinearId};
pub use validator::{ContractViolation, IOUContract, ValidationResult};

pub(crate) use state::write_did;
