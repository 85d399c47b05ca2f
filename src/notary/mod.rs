// Notary module - uniqueness consensus over consumed states

mod service;

pub use service::{Notary, NotaryConfig, NotaryError, UniquenessNotary};
