//! In-memory storage backend
//!
//! Behaves like the SQLite backend (secret columns immutable, derived tables
//! replaceable, atomic batches) without touching disk. Used by tests and by
//! callers that only need a throwaway wallet.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;

use crate::{
    data_structures::{
        chain::OutPoint,
        coin_records::{MintRecord, SpendRecord},
        types::{SerialNumber, TxId},
        wallet_transaction::WalletTxRecord,
    },
    errors::{WalletError, WalletResult},
    storage::{
        owned_output::OwnedOutput,
        storage_trait::{StorageBatch, StorageStats, WalletStorage},
        transaction_store::TransactionStore,
    },
};

#[derive(Debug, Default)]
struct MemoryState {
    mints: Vec<MintRecord>,
    mint_index: HashMap<SerialNumber, usize>,
    spends: Vec<SpendRecord>,
    spend_index: HashMap<TxId, usize>,
    transactions: TransactionStore,
    outputs: BTreeMap<OutPoint, OwnedOutput>,
    scanned_height: Option<u64>,
}

impl MemoryState {
    fn apply(&mut self, batch: StorageBatch) {
        if batch.replace_derived {
            self.spends.clear();
            self.spend_index.clear();
            self.transactions.remove_all();
            self.outputs.clear();
        }
        for mint in batch.mints {
            match self.mint_index.get(&mint.serial_number) {
                Some(&i) => {
                    let existing = &mut self.mints[i];
                    existing.spent = mint.spent;
                    existing.spend_txid = mint.spend_txid;
                    existing.mint_height = mint.mint_height;
                }
                None => {
                    self.mint_index.insert(mint.serial_number, self.mints.len());
                    self.mints.push(mint);
                }
            }
        }
        for spend in batch.spends {
            match self.spend_index.get(&spend.spend_txid) {
                Some(&i) => self.spends[i] = spend,
                None => {
                    self.spend_index.insert(spend.spend_txid, self.spends.len());
                    self.spends.push(spend);
                }
            }
        }
        for record in batch.transactions {
            self.transactions.upsert(record);
        }
        for output in batch.outputs {
            self.outputs.insert(output.outpoint, output);
        }
        if batch.scanned_height.is_some() {
            self.scanned_height = batch.scanned_height;
        }
    }
}

/// Mutex-guarded in-memory [`WalletStorage`]
///
/// Cloning shares the underlying state, so a test can drop a wallet and
/// reopen another on the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    fail_next_commit: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail with the given message and write nothing
    pub fn fail_next_commit(&self, message: impl Into<String>) -> WalletResult<()> {
        *self
            .fail_next_commit
            .lock()
            .map_err(|_| WalletError::StorageError("Failure flag lock poisoned".to_string()))? =
            Some(message.into());
        Ok(())
    }

    fn state(&self) -> WalletResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| WalletError::StorageError("Memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl WalletStorage for MemoryStorage {
    async fn initialize(&self) -> WalletResult<()> {
        Ok(())
    }

    async fn load_mints(&self) -> WalletResult<Vec<MintRecord>> {
        Ok(self.state()?.mints.clone())
    }

    async fn load_spends(&self) -> WalletResult<Vec<SpendRecord>> {
        Ok(self.state()?.spends.clone())
    }

    async fn load_transactions(&self) -> WalletResult<Vec<WalletTxRecord>> {
        Ok(self.state()?.transactions.get_all(None))
    }

    async fn load_outputs(&self) -> WalletResult<Vec<OwnedOutput>> {
        Ok(self.state()?.outputs.values().cloned().collect())
    }

    async fn get_scanned_height(&self) -> WalletResult<Option<u64>> {
        Ok(self.state()?.scanned_height)
    }

    async fn commit(&self, batch: StorageBatch) -> WalletResult<()> {
        let injected = self
            .fail_next_commit
            .lock()
            .map_err(|_| WalletError::StorageError("Failure flag lock poisoned".to_string()))?
            .take();
        if let Some(message) = injected {
            return Err(WalletError::StorageError(message));
        }
        self.state()?.apply(batch);
        Ok(())
    }

    async fn get_statistics(&self) -> WalletResult<StorageStats> {
        let state = self.state()?;
        Ok(StorageStats {
            mint_count: state.mints.len(),
            unspent_mint_count: state.mints.iter().filter(|m| m.is_unspent()).count(),
            spend_count: state.spends.len(),
            transaction_count: state.transactions.len(),
            unconfirmed_transaction_count: state
                .transactions
                .iter()
                .filter(|r| !r.is_confirmed())
                .count(),
            output_count: state.outputs.len(),
            scanned_height: state.scanned_height,
        })
    }

    async fn close(&self) -> WalletResult<()> {
        Ok(())
    }
}
