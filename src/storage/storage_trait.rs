//! Storage trait definition for wallet persistence
//!
//! Two kinds of state are persisted. Mint secrets can never be rebuilt from
//! chain data and are never purged. Everything else (spend linkage,
//! transaction cache, owned outputs, scan height) is derived state that a
//! recovery path may replace wholesale.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{
        coin_records::{MintRecord, SpendRecord},
        wallet_transaction::WalletTxRecord,
    },
    errors::WalletResult,
};

use super::owned_output::OwnedOutput;

/// One atomic write
///
/// With `replace_derived` set, the derived tables are cleared before the
/// batch is applied. Mint rows are always upserted: once a serial is stored
/// its secret columns are never rewritten, only `spent`, `spend_txid` and
/// `mint_height` follow the batch.
#[derive(Debug, Clone, Default)]
pub struct StorageBatch {
    pub replace_derived: bool,
    pub mints: Vec<MintRecord>,
    pub spends: Vec<SpendRecord>,
    /// Appended in order; existing txids keep their position
    pub transactions: Vec<WalletTxRecord>,
    pub outputs: Vec<OwnedOutput>,
    pub scanned_height: Option<u64>,
}

impl StorageBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch that replaces every derived table
    pub fn replacing_derived() -> Self {
        Self {
            replace_derived: true,
            ..Default::default()
        }
    }

    pub fn with_mints(mut self, mints: impl IntoIterator<Item = MintRecord>) -> Self {
        self.mints.extend(mints);
        self
    }

    pub fn with_spends(mut self, spends: impl IntoIterator<Item = SpendRecord>) -> Self {
        self.spends.extend(spends);
        self
    }

    pub fn with_transactions(mut self, transactions: impl IntoIterator<Item = WalletTxRecord>) -> Self {
        self.transactions.extend(transactions);
        self
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = OwnedOutput>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn with_scanned_height(mut self, height: u64) -> Self {
        self.scanned_height = Some(height);
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.replace_derived
            && self.mints.is_empty()
            && self.spends.is_empty()
            && self.transactions.is_empty()
            && self.outputs.is_empty()
            && self.scanned_height.is_none()
    }
}

/// Everything a wallet needs to resume
#[derive(Debug, Clone, Default)]
pub struct StoredWalletState {
    pub mints: Vec<MintRecord>,
    pub spends: Vec<SpendRecord>,
    pub transactions: Vec<WalletTxRecord>,
    pub outputs: Vec<OwnedOutput>,
    pub scanned_height: Option<u64>,
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub mint_count: usize,
    pub unspent_mint_count: usize,
    pub spend_count: usize,
    pub transaction_count: usize,
    pub unconfirmed_transaction_count: usize,
    pub output_count: usize,
    pub scanned_height: Option<u64>,
}

/// Storage backend for wallet state
#[async_trait]
pub trait WalletStorage: Send + Sync {
    /// Create tables or other structures; safe to call repeatedly
    async fn initialize(&self) -> WalletResult<()>;

    /// All mint records; an undecodable secret row is `SecretsCorrupted`
    async fn load_mints(&self) -> WalletResult<Vec<MintRecord>>;

    async fn load_spends(&self) -> WalletResult<Vec<SpendRecord>>;

    /// Transaction records in insertion order
    async fn load_transactions(&self) -> WalletResult<Vec<WalletTxRecord>>;

    async fn load_outputs(&self) -> WalletResult<Vec<OwnedOutput>>;

    async fn get_scanned_height(&self) -> WalletResult<Option<u64>>;

    /// Apply a batch atomically
    async fn commit(&self, batch: StorageBatch) -> WalletResult<()>;

    async fn get_statistics(&self) -> WalletResult<StorageStats>;

    async fn close(&self) -> WalletResult<()>;

    /// Load the full persisted state
    async fn load_state(&self) -> WalletResult<StoredWalletState> {
        Ok(StoredWalletState {
            mints: self.load_mints().await?,
            spends: self.load_spends().await?,
            transactions: self.load_transactions().await?,
            outputs: self.load_outputs().await?,
            scanned_height: self.get_scanned_height().await?,
        })
    }
}
