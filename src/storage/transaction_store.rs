//! In-memory Transaction Store
//!
//! Keyed by txid, iterated in insertion order. Replacing an existing record
//! keeps its original position so display order survives rescans.

use std::collections::HashMap;

use crate::data_structures::{
    types::TxId,
    wallet_transaction::{TxCategory, WalletTxRecord},
};

/// How `upsert_with` treats the `time_received` of a record already present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertPolicy {
    /// Take every field from the incoming record
    Overwrite,
    /// Keep the first-seen receive time
    PreserveReceivedTime,
}

/// Ordering applied by [`TransactionStore::list`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxOrder {
    /// Insertion order; a limit keeps the most recent entries
    #[default]
    Insertion,
    /// Confirmed by block height, unconfirmed last
    Recency,
    TxidAscending,
    TxidDescending,
}

/// Query filters for transaction listings
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub category: Option<TxCategory>,
    /// Only records confirmed above this height, plus unconfirmed ones
    pub since_height: Option<u64>,
    pub include_unconfirmed: bool,
    pub include_watchonly: bool,
    pub order: TxOrder,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    /// Everything, insertion order
    pub fn new() -> Self {
        Self {
            include_unconfirmed: true,
            include_watchonly: true,
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: TxCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn since_height(mut self, height: u64) -> Self {
        self.since_height = Some(height);
        self
    }

    pub fn confirmed_only(mut self) -> Self {
        self.include_unconfirmed = false;
        self
    }

    pub fn exclude_watchonly(mut self) -> Self {
        self.include_watchonly = false;
        self
    }

    pub fn with_order(mut self, order: TxOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &WalletTxRecord) -> bool {
        if self.category.is_some_and(|c| c != record.category) {
            return false;
        }
        if !self.include_watchonly && record.involves_watchonly {
            return false;
        }
        match record.block_height {
            None => self.include_unconfirmed,
            Some(height) => self.since_height.map_or(true, |since| height > since),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionStore {
    records: Vec<WalletTxRecord>,
    index: HashMap<TxId, usize>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from records already in insertion order
    pub fn from_records(records: Vec<WalletTxRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.upsert(record);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, txid: &TxId) -> Option<&WalletTxRecord> {
        self.index.get(txid).map(|&i| &self.records[i])
    }

    pub fn contains(&self, txid: &TxId) -> bool {
        self.index.contains_key(txid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WalletTxRecord> {
        self.records.iter()
    }

    pub fn upsert(&mut self, record: WalletTxRecord) {
        self.upsert_with(record, UpsertPolicy::Overwrite);
    }

    pub fn upsert_with(&mut self, mut record: WalletTxRecord, policy: UpsertPolicy) {
        match self.index.get(&record.txid) {
            Some(&i) => {
                if policy == UpsertPolicy::PreserveReceivedTime {
                    record.time_received = self.records[i].time_received;
                }
                self.records[i] = record;
            }
            None => {
                self.index.insert(record.txid, self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Confirmed records above `since_height` (all when `None`) plus every
    /// unconfirmed record, in insertion order
    pub fn get_all(&self, since_height: Option<u64>) -> Vec<WalletTxRecord> {
        let filter = TransactionFilter {
            since_height,
            include_unconfirmed: true,
            include_watchonly: true,
            ..Default::default()
        };
        self.records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// Drop every record without a block, returning them in insertion order
    pub fn remove_unconfirmed(&mut self) -> Vec<WalletTxRecord> {
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(WalletTxRecord::is_confirmed);
        self.records = kept;
        self.reindex();
        removed
    }

    pub fn remove_all(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        self.index.clear();
        removed
    }

    /// Refresh confirmation counts against the current tip
    pub fn refresh_confirmations(&mut self, tip_height: u64) {
        for record in &mut self.records {
            record.refresh_confirmations(tip_height);
        }
    }

    /// Filtered, ordered and limited view for external queries
    pub fn list(&self, filter: &TransactionFilter) -> Vec<WalletTxRecord> {
        let mut selected: Vec<(usize, &WalletTxRecord)> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| filter.matches(r))
            .collect();

        match filter.order {
            TxOrder::Insertion => {
                if let Some(limit) = filter.limit {
                    let skip = selected.len().saturating_sub(limit);
                    selected.drain(..skip);
                }
                return selected.into_iter().map(|(_, r)| r.clone()).collect();
            }
            TxOrder::Recency => selected.sort_by_key(|(i, r)| (r.block_height.unwrap_or(u64::MAX), *i)),
            TxOrder::TxidAscending => selected.sort_by(|a, b| a.1.txid.cmp(&b.1.txid)),
            TxOrder::TxidDescending => selected.sort_by(|a, b| b.1.txid.cmp(&a.1.txid)),
        }
        selected
            .into_iter()
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.txid, i))
            .collect();
    }
}
