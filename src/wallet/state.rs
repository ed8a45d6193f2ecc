//! The wallet's in-memory state: ledger, transaction store, owned outputs
//!
//! A `WalletCore` is a plain value. Writers clone the published core, mutate
//! the clone and swap it in, so readers only ever see whole states.

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard};

use crate::{
    data_structures::{
        chain::OutPoint,
        coin_records::MintRecord,
        denomination::{CoinEpoch, EpochSchedule},
        types::Amount,
    },
    errors::WalletResult,
    ledger::CoinLedger,
    storage::{OwnedOutput, StorageBatch, StoredWalletState, TransactionStore},
};

#[derive(Debug, Clone, Default)]
pub struct WalletCore {
    pub ledger: CoinLedger,
    pub transactions: TransactionStore,
    pub outputs: BTreeMap<OutPoint, OwnedOutput>,
    pub scanned_height: Option<u64>,
}

impl WalletCore {
    pub fn new(schedule: EpochSchedule) -> Self {
        Self {
            ledger: CoinLedger::new(schedule),
            ..Default::default()
        }
    }

    /// Rebuild from persisted state; corrupted secrets are fatal
    pub fn from_stored(schedule: EpochSchedule, state: StoredWalletState) -> WalletResult<Self> {
        Ok(Self {
            ledger: CoinLedger::from_records(schedule, state.mints, state.spends)?,
            transactions: TransactionStore::from_records(state.transactions),
            outputs: state
                .outputs
                .into_iter()
                .map(|output| (output.outpoint, output))
                .collect(),
            scanned_height: state.scanned_height,
        })
    }

    /// Drop chain-derived coin links and outputs; secrets and the
    /// transaction store stay
    pub fn reset_chain_links(&mut self) {
        self.ledger.reset_spend_links();
        self.outputs.clear();
    }

    /// Batch that replaces every derived table with this state
    pub fn full_batch(&self) -> StorageBatch {
        let mut batch = StorageBatch::replacing_derived()
            .with_mints(self.ledger.mints().iter().cloned())
            .with_spends(self.ledger.spends().iter().cloned())
            .with_transactions(self.transactions.iter().cloned())
            .with_outputs(self.outputs.values().cloned());
        batch.scanned_height = self.scanned_height;
        batch
    }

    /// Rows that differ from `previous`, for incremental commits
    pub fn diff_batch(&self, previous: &WalletCore) -> StorageBatch {
        let mut batch = StorageBatch::new()
            .with_mints(
                self.ledger
                    .mints()
                    .iter()
                    .filter(|m| previous.ledger.find_by_serial(&m.serial_number) != Some(*m))
                    .cloned(),
            )
            .with_spends(
                self.ledger
                    .spends()
                    .iter()
                    .filter(|s| previous.ledger.spend_for(&s.spend_txid) != Some(*s))
                    .cloned(),
            )
            .with_transactions(
                self.transactions
                    .iter()
                    .filter(|r| previous.transactions.get(&r.txid) != Some(*r))
                    .cloned(),
            )
            .with_outputs(
                self.outputs
                    .values()
                    .filter(|o| previous.outputs.get(&o.outpoint) != Some(*o))
                    .cloned(),
            );
        if self.scanned_height != previous.scanned_height {
            batch.scanned_height = self.scanned_height;
        }
        batch
    }

    pub fn tip_height(&self) -> u64 {
        self.scanned_height.unwrap_or(0)
    }

    /// Confirmations of the transaction that minted `mint`
    pub fn mint_confirmations(&self, mint: &MintRecord) -> u64 {
        self.transactions
            .get(&mint.mint_txid)
            .and_then(|record| record.block_height)
            .filter(|&height| height <= self.tip_height())
            .map_or(0, |height| self.tip_height() - height + 1)
    }

    /// Unspent coins of `epoch` with at least `min_confirmations`, largest first
    pub fn spendable_mints(&self, epoch: CoinEpoch, min_confirmations: u64) -> Vec<&MintRecord> {
        let mut coins: Vec<&MintRecord> = self
            .ledger
            .unspent_mints()
            .filter(|m| m.epoch == epoch && self.mint_confirmations(m) >= min_confirmations)
            .collect();
        coins.sort_by(|a, b| {
            b.value()
                .cmp(&a.value())
                .then_with(|| a.serial_number.cmp(&b.serial_number))
        });
        coins
    }

    /// Spendable transparent outputs, largest first
    pub fn spendable_outputs(&self, coinbase_maturity: u64) -> Vec<&OwnedOutput> {
        let tip = self.tip_height();
        let mut outputs: Vec<&OwnedOutput> = self
            .outputs
            .values()
            .filter(|o| o.is_spendable_at(tip, coinbase_maturity))
            .collect();
        outputs.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.outpoint.cmp(&b.outpoint)));
        outputs
    }

    pub fn transparent_balance(&self, coinbase_maturity: u64) -> Amount {
        self.spendable_outputs(coinbase_maturity)
            .iter()
            .map(|o| o.value)
            .sum()
    }
}

/// Published wallet state plus the single-writer gate
///
/// Readers take the read lock and always see a whole `WalletCore`. Writers
/// hold the gate for the entire read-modify-publish cycle, so recovery,
/// live sync and authoring never interleave.
#[derive(Debug, Default)]
pub struct SharedCore {
    published: RwLock<WalletCore>,
    writer: Arc<Mutex<()>>,
}

impl SharedCore {
    pub fn new(core: WalletCore) -> Self {
        Self {
            published: RwLock::new(core),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, WalletCore> {
        self.published.read().await
    }

    /// Clone of the published state, for use as a writer's working copy
    pub async fn snapshot(&self) -> WalletCore {
        self.published.read().await.clone()
    }

    /// Acquire the writer gate; the guard may be moved into a task
    pub async fn lock_writer(&self) -> OwnedMutexGuard<()> {
        self.writer.clone().lock_owned().await
    }

    /// Replace the published state in one step
    pub async fn publish(&self, core: WalletCore) {
        *self.published.write().await = core;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        denomination::Denomination,
        types::{Address, BlockHash, TxId},
        wallet_transaction::{TxCategory, WalletTxRecord},
    };

    fn mint_record(txid: TxId, height: Option<u64>) -> WalletTxRecord {
        WalletTxRecord {
            txid,
            category: TxCategory::Mint,
            amount: -1,
            address: None,
            confirmations: 0,
            block_hash: height.map(|_| BlockHash::new([9u8; 32])),
            block_height: height,
            time_received: 0,
            involves_watchonly: false,
        }
    }

    #[test]
    fn test_spendable_mints_require_confirmations() {
        let mut core = WalletCore::new(EpochSchedule::regtest());
        let txid = TxId::new([1u8; 32]);
        core.ledger.record_mint(Denomination::D10, 120, txid).unwrap();
        core.transactions.upsert(mint_record(txid, None));
        core.scanned_height = Some(130);
        assert!(core.spendable_mints(CoinEpoch::Zerocoin, 6).is_empty());

        core.transactions.upsert(mint_record(txid, Some(125)));
        assert_eq!(core.spendable_mints(CoinEpoch::Zerocoin, 6).len(), 1);
        assert!(core.spendable_mints(CoinEpoch::Sigma, 6).is_empty());
    }

    #[test]
    fn test_diff_batch_contains_only_changes() {
        let mut core = WalletCore::new(EpochSchedule::regtest());
        core.ledger
            .record_mint(Denomination::D1, 120, TxId::new([1u8; 32]))
            .unwrap();
        let before = core.clone();

        let outpoint = OutPoint::new(TxId::new([2u8; 32]), 0);
        core.outputs.insert(
            outpoint,
            OwnedOutput::new(outpoint, Address::from("w"), 5, Some(121), false),
        );
        core.scanned_height = Some(121);

        let batch = core.diff_batch(&before);
        assert!(!batch.replace_derived);
        assert!(batch.mints.is_empty());
        assert_eq!(batch.outputs.len(), 1);
        assert_eq!(batch.scanned_height, Some(121));

        let full = core.full_batch();
        assert!(full.replace_derived);
        assert_eq!(full.mints.len(), 1);
    }
}
