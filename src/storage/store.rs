// SledLedger - Persistent ledger storage using sled
//
// Trees:
// - transactions: transition id -> committed transition
// - consumed:     state ref key  -> consuming transition id
// - meta:         node identity

use crate::identity::Keypair;
use crate::storage::ledger::{check_final, CommittedTransition, LedgerStore, StoreError};
use crate::transition::{SignedTransition, StateAndRef, StateRef, TransitionId};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;
use std::sync::Mutex;

mod keys {
    pub const TRANSACTIONS: &str = "transactions";
    pub const CONSUMED: &str = "consumed";
    pub const META: &str = "meta";
    pub const IDENTITY_KEYPAIR: &[u8] = b"identity:keypair";
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    pub transaction_count: usize,
    pub consumed_count: usize,
    pub disk_size_bytes: u64,
}

/// Persistent ledger store
///
/// Uses sled for crash-safe, embedded storage. Writes are serialised by a
/// lock, and each one is a single transaction over the consumed and
/// transactions trees.
pub struct SledLedger {
    db: sled::Db,
    transactions: sled::Tree,
    consumed: sled::Tree,
    meta: sled::Tree,
    write_lock: Mutex<()>,
}

impl SledLedger {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self {
            transactions: db.open_tree(keys::TRANSACTIONS)?,
            consumed: db.open_tree(keys::CONSUMED)?,
            meta: db.open_tree(keys::META)?,
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            transaction_count: self.transactions.len(),
            consumed_count: self.consumed.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    /// Load the node keypair, generating and saving one on first use
    pub fn load_or_create_keypair(&self) -> Result<Keypair, StoreError> {
        if let Some(keypair) = self.load_keypair()? {
            return Ok(keypair);
        }
        let keypair = Keypair::generate();
        self.save_keypair(&keypair)?;
        Ok(keypair)
    }

    pub fn save_keypair(&self, keypair: &Keypair) -> Result<(), StoreError> {
        self.meta.insert(keys::IDENTITY_KEYPAIR, keypair.to_bytes())?;
        Ok(())
    }

    pub fn load_keypair(&self) -> Result<Option<Keypair>, StoreError> {
        match self.meta.get(keys::IDENTITY_KEYPAIR)? {
            Some(bytes) => {
                let keypair = Keypair::from_bytes(&bytes)
                    .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(keypair))
            }
            None => Ok(None),
        }
    }

    fn decode_committed(bytes: &[u8]) -> Result<CommittedTransition, StoreError> {
        postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
    }

    fn decode_id(bytes: &[u8]) -> Result<TransitionId, StoreError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StoreError::DeserializationFailed("invalid transition id length".into()))?;
        Ok(TransitionId::from_bytes(array))
    }

    /// All committed transitions, oldest first
    pub fn committed(&self) -> Result<Vec<CommittedTransition>, StoreError> {
        let mut all = Vec::with_capacity(self.transactions.len());
        for entry in self.transactions.iter() {
            let (_, value) = entry?;
            all.push(Self::decode_committed(&value)?);
        }
        all.sort_by_key(|c| c.recorded_at);
        Ok(all)
    }
}

impl LedgerStore for SledLedger {
    fn put(&self, stx: &SignedTransition) -> Result<(), StoreError> {
        check_final(stx)?;
        let id = stx.id();
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let value = postcard::to_allocvec(&CommittedTransition::now(stx.clone()))
            .map_err(|e| StoreError::SerializationFailed(e.to_string()))?;
        let inputs = stx.transition().inputs();

        // Consumption marks and the record commit together or not at all
        let result = (&self.consumed, &self.transactions).transaction(|(consumed, transactions)| {
            if transactions.get(id.as_bytes())?.is_some() {
                return Ok(());
            }
            for input in inputs {
                if let Some(by) = consumed.get(input.to_key())? {
                    return Err(ConflictableTransactionError::Abort((*input, by)));
                }
            }
            for input in inputs {
                consumed.insert(&input.to_key()[..], &id.as_bytes()[..])?;
            }
            transactions.insert(&id.as_bytes()[..], value.as_slice())?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort((state_ref, by))) => Err(StoreError::AlreadyConsumed {
                state_ref,
                consumed_by: Self::decode_id(&by)?,
            }),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn get_transaction(&self, id: &TransitionId) -> Result<Option<SignedTransition>, StoreError> {
        match self.transactions.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode_committed(&bytes)?.transition)),
            None => Ok(None),
        }
    }

    fn consumed_by(&self, state_ref: &StateRef) -> Result<Option<TransitionId>, StoreError> {
        match self.consumed.get(state_ref.to_key())? {
            Some(bytes) => Ok(Some(Self::decode_id(&bytes)?)),
            None => Ok(None),
        }
    }

    fn unconsumed_states(&self) -> Result<Vec<StateAndRef>, StoreError> {
        let mut states = Vec::new();
        for committed in self.committed()? {
            for output in committed.transition.transition().output_refs() {
                if !self.consumed.contains_key(output.reference.to_key())? {
                    states.push(output);
                }
            }
        }
        Ok(states)
    }

    fn transaction_count(&self) -> Result<usize, StoreError> {
        Ok(self.transactions.len())
    }
}
