// Storage module - the committed local ledger (vault)

mod ledger;
mod store;

pub use ledger::{CommittedTransition, LedgerStore, MemoryLedger, StoreError};
pub use store::{SledLedger, StorageStats};
