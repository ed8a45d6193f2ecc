//! Chain Scanner
//!
//! Walks blocks in ascending height order (then the mempool) and turns every
//! transaction touching the wallet into a [`WalletTxRecord`], routing revealed
//! serials through the ledger's spend linking and matching published
//! commitments against known mints. The same classification runs for
//! transactions the wallet authors itself, so a rescan reproduces the records
//! live operation produced.

use std::{
    ops::RangeInclusive,
    sync::Arc,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, error, info, warn};

use crate::{
    data_structures::{
        chain::{Block, ChainTransaction, TxInput, TxOutput},
        denomination::CoinEpoch,
        types::{Address, Amount, BlockHash, SerialNumber},
        wallet_transaction::{TxCategory, WalletTxRecord},
    },
    errors::{WalletError, WalletResult},
    ledger::MintMatch,
    scanning::{
        chain_source::{ChainSource, KeyOwnership},
        config::ScanConfig,
        progress::ScanProgressHandle,
        scan_results::ScanReport,
    },
    storage::{OwnedOutput, UpsertPolicy},
    wallet::state::WalletCore,
};

/// Where a transaction was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLocation {
    pub height: u64,
    pub hash: BlockHash,
    pub time: u64,
}

impl BlockLocation {
    pub fn of(block: &Block) -> Self {
        Self {
            height: block.height,
            hash: block.hash,
            time: block.time,
        }
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub struct ChainScanner {
    keys: Arc<dyn KeyOwnership>,
    config: ScanConfig,
}

impl ChainScanner {
    pub fn new(keys: Arc<dyn KeyOwnership>, config: ScanConfig) -> Self {
        Self { keys, config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Lazily classify the transactions of one block
    ///
    /// Each call to `next` applies one transaction's ledger effects before
    /// yielding its record, so later transactions in the block see earlier
    /// mints.
    pub fn candidates<'a>(
        &'a self,
        core: &'a mut WalletCore,
        transactions: &'a [ChainTransaction],
        location: Option<BlockLocation>,
        time_received: u64,
        report: &'a mut ScanReport,
    ) -> TxCandidates<'a> {
        TxCandidates {
            scanner: self,
            core,
            transactions: transactions.iter(),
            location,
            time_received,
            report,
        }
    }

    /// Scan blocks in `range` in ascending order, upserting every record
    pub async fn scan_range<C: ChainSource + ?Sized>(
        &self,
        chain: &C,
        core: &mut WalletCore,
        range: RangeInclusive<u64>,
        policy: UpsertPolicy,
        progress: Option<&ScanProgressHandle>,
    ) -> WalletResult<ScanReport> {
        let started = Instant::now();
        let (from, to) = (*range.start(), *range.end());
        let mut report = ScanReport {
            from_height: Some(from),
            to_height: Some(to),
            ..Default::default()
        };
        if from > to {
            return Ok(report);
        }
        info!("Scanning blocks {} to {}", from, to);

        let batch_size = self.config.batch_size.max(1);
        for height in range {
            let block = chain.block_at(height).await?.ok_or_else(|| {
                WalletError::ScanningError(format!("Block {height} missing from chain source"))
            })?;
            if block.height != height {
                return Err(WalletError::ScanningError(format!(
                    "Chain source returned block {} for height {height}",
                    block.height
                )));
            }
            let found = self.scan_block(core, &block, policy, &mut report);
            core.scanned_height = Some(height);
            if let Some(progress) = progress {
                progress.advance(height, found);
            }

            let scanned = height - from + 1;
            if scanned % batch_size == 0 {
                if self.config.log_every_batches > 0
                    && (scanned / batch_size) % self.config.log_every_batches == 0
                {
                    info!("Scanned {} of {} blocks", scanned, to - from + 1);
                }
                if !self.config.batch_delay.is_zero() {
                    tokio::time::sleep(self.config.batch_delay).await;
                } else {
                    tokio::task::yield_now().await;
                }
            }
        }

        report.duration = started.elapsed();
        info!(
            "Scan of {} blocks found {} wallet transactions ({} spends linked, {} mints reconfirmed)",
            report.blocks_scanned, report.records_found, report.spends_linked, report.mints_reconfirmed
        );
        Ok(report)
    }

    /// Classify one block into `core`, returning the number of records found
    pub fn scan_block(
        &self,
        core: &mut WalletCore,
        block: &Block,
        policy: UpsertPolicy,
        report: &mut ScanReport,
    ) -> u64 {
        let location = BlockLocation::of(block);
        let records: Vec<WalletTxRecord> = self
            .candidates(core, &block.transactions, Some(location), block.time, report)
            .collect();
        let found = records.len() as u64;
        for record in records {
            core.transactions.upsert_with(record, policy);
        }
        report.blocks_scanned += 1;
        report.records_found += found;
        debug!("Block {} yielded {} wallet transactions", block.height, found);
        found
    }

    /// Classify current mempool transactions
    pub async fn scan_mempool<C: ChainSource + ?Sized>(
        &self,
        chain: &C,
        core: &mut WalletCore,
        policy: UpsertPolicy,
    ) -> WalletResult<ScanReport> {
        let started = Instant::now();
        let mempool = chain.mempool().await?;
        let mut report = ScanReport {
            mempool_transactions: mempool.len() as u64,
            ..Default::default()
        };
        let records: Vec<WalletTxRecord> = self
            .candidates(core, &mempool, None, unix_now(), &mut report)
            .collect();
        report.records_found = records.len() as u64;
        for record in records {
            core.transactions.upsert_with(record, policy);
        }
        report.duration = started.elapsed();
        debug!(
            "Mempool: {} transactions, {} wallet-relevant",
            report.mempool_transactions, report.records_found
        );
        Ok(report)
    }

    /// Apply one transaction to `core` and build its record, if it touches the wallet
    pub fn classify(
        &self,
        core: &mut WalletCore,
        tx: &ChainTransaction,
        location: Option<BlockLocation>,
        time_received: u64,
        report: &mut ScanReport,
    ) -> Option<WalletTxRecord> {
        let height = location.map(|l| l.height);
        let mut debit: Amount = 0;
        let mut credit: Amount = 0;
        let mut watch_only = false;

        for input in &tx.inputs {
            if let TxInput::Transparent { prevout } = input {
                if let Some(owned) = core.outputs.get_mut(prevout) {
                    match owned.spent_in {
                        Some(other) if other != tx.txid => {
                            warn!(
                                "Output {}:{} already spent by {}, seen again in {}",
                                prevout.txid, prevout.index, other, tx.txid
                            );
                        }
                        _ => {
                            debit += owned.value;
                            watch_only |= self.keys.is_watch_only(&owned.address);
                            owned.mark_spent(tx.txid);
                        }
                    }
                }
            }
        }

        let revealed: Vec<SerialNumber> = tx.revealed_serials().copied().collect();
        let mut spent_value: Amount = 0;
        let mut linked = 0u64;
        if !revealed.is_empty() {
            match core
                .ledger
                .link_spend(tx.txid, height, &revealed, tx.outputs.len() as u32)
            {
                Ok(mints) => {
                    linked = mints.len() as u64;
                    spent_value = mints.iter().map(|m| m.value()).sum();
                    report.foreign_serials += revealed.len() as u64 - linked;
                }
                Err(e) => {
                    error!("Spend {} conflicts with an existing link: {}", tx.txid, e);
                    report.conflicts.push(e);
                }
            }
            report.spends_linked += linked;
        }

        let mut minted: Amount = 0;
        let mut own_address: Option<Address> = None;
        let mut foreign_address: Option<Address> = None;
        for (index, output) in tx.outputs.iter().enumerate() {
            match output {
                TxOutput::Payment { address, value } => {
                    if !self.keys.owns(output) {
                        foreign_address.get_or_insert_with(|| address.clone());
                        continue;
                    }
                    credit += value;
                    watch_only |= self.keys.is_watch_only(address);
                    own_address.get_or_insert_with(|| address.clone());
                    let outpoint = tx.outpoint(index as u32);
                    core.outputs
                        .entry(outpoint)
                        .and_modify(|existing| existing.height = height)
                        .or_insert_with(|| {
                            OwnedOutput::new(outpoint, address.clone(), *value, height, tx.coinbase)
                        });
                }
                TxOutput::Mint {
                    commitment,
                    epoch,
                    value,
                } => {
                    let denomination = CoinEpoch::try_from(*epoch)
                        .and_then(|epoch| epoch.denomination_for(*value));
                    if let Err(e) = denomination {
                        warn!("Skipping mint output {} in {}: {}", commitment, tx.txid, e);
                        report.rejected_mints += 1;
                        continue;
                    }
                    match core.ledger.reconfirm_mint(commitment, &tx.txid, height) {
                        MintMatch::Reconfirmed(mint) => {
                            minted += mint.value();
                            report.mints_reconfirmed += 1;
                        }
                        MintMatch::TxidMismatch(mint) => {
                            warn!(
                                "Commitment {} recorded for {} but published by {}",
                                commitment, mint.mint_txid, tx.txid
                            );
                        }
                        MintMatch::NotOurs => {}
                    }
                }
            }
        }

        let (category, amount, address) = if linked > 0 && minted > 0 {
            (TxCategory::Mint, -minted, None)
        } else if linked > 0 {
            (
                TxCategory::Spend,
                spent_value,
                foreign_address.or(own_address),
            )
        } else if minted > 0 {
            (TxCategory::Mint, -minted, None)
        } else if tx.coinbase && credit > 0 {
            (TxCategory::Generate, credit, own_address)
        } else if debit > 0 {
            (TxCategory::Send, credit - debit, foreign_address)
        } else if credit > 0 {
            (TxCategory::Receive, credit, own_address)
        } else {
            return None;
        };

        debug!("{} {} {}", category, tx.txid, amount);
        Some(WalletTxRecord {
            txid: tx.txid,
            category,
            amount,
            address,
            confirmations: 0,
            block_hash: location.map(|l| l.hash),
            block_height: height,
            time_received,
            involves_watchonly: watch_only,
        })
    }
}

/// Iterator returned by [`ChainScanner::candidates`]
pub struct TxCandidates<'a> {
    scanner: &'a ChainScanner,
    core: &'a mut WalletCore,
    transactions: std::slice::Iter<'a, ChainTransaction>,
    location: Option<BlockLocation>,
    time_received: u64,
    report: &'a mut ScanReport,
}

impl<'a> Iterator for TxCandidates<'a> {
    type Item = WalletTxRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for tx in self.transactions.by_ref() {
            let record = self.scanner.classify(
                self.core,
                tx,
                self.location,
                self.time_received,
                self.report,
            );
            if record.is_some() {
                return record;
            }
        }
        None
    }
}
