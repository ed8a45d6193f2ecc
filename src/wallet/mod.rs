//! Wallet facade
//!
//! Ties the coin ledger, transaction store and scanner to a chain backend and
//! a storage backend. Every write (recovery, live sync, authoring) takes the
//! single writer gate, mutates a private copy of the wallet state and then
//! commits and publishes it, so readers always see a whole state.

pub mod builder;
pub mod params;
pub mod state;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    data_structures::{
        chain::{ChainTransaction, TxInput, TxOutput},
        coin_records::{MintRecord, SpendRecord},
        denomination::{CoinEpoch, Denomination},
        types::{Address, Amount},
        wallet_transaction::WalletTxRecord,
    },
    errors::{WalletError, WalletResult},
    recovery::{RecoveryContext, RecoveryMode},
    scanning::{
        unix_now, ChainBackend, ChainScanner, KeyOwnership, ScanProgressHandle, ScanReport,
    },
    storage::{StorageBatch, StorageStats, TransactionFilter, UpsertPolicy, WalletStorage},
};

pub use builder::WalletBuilder;
pub use state::{SharedCore, WalletCore};
pub use params::WalletParams;

const HEIGHT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Unspent coins of one epoch and denomination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinBalance {
    pub epoch: CoinEpoch,
    pub denomination: Denomination,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletBalances {
    /// Spendable transparent value, coinbase maturity applied
    pub transparent: Amount,
    /// Total value of unspent coins
    pub coins_value: Amount,
    pub coins: Vec<CoinBalance>,
}

pub struct Wallet {
    storage: Arc<dyn WalletStorage>,
    chain: Arc<dyn ChainBackend>,
    keys: Arc<dyn KeyOwnership>,
    params: WalletParams,
    scanner: Arc<ChainScanner>,
    shared: Arc<SharedCore>,
    recovery: RecoveryContext,
}

impl Wallet {
    pub(crate) fn new(
        storage: Arc<dyn WalletStorage>,
        chain: Arc<dyn ChainBackend>,
        keys: Arc<dyn KeyOwnership>,
        params: WalletParams,
        scanner: Arc<ChainScanner>,
        shared: Arc<SharedCore>,
        recovery: RecoveryContext,
    ) -> Self {
        Self {
            storage,
            chain,
            keys,
            params,
            scanner,
            shared,
            recovery,
        }
    }

    pub fn params(&self) -> &WalletParams {
        &self.params
    }

    pub fn recovery_mode(&self) -> RecoveryMode {
        self.recovery.mode
    }

    pub fn recovery_progress(&self) -> &ScanProgressHandle {
        &self.recovery.progress
    }

    pub fn receive_address(&self) -> Address {
        self.keys.receive_address()
    }

    // ---- Queries ----

    /// Wallet transactions matching `filter`, confirmations refreshed
    /// against the wallet's scanned height
    pub async fn list_transactions(&self, filter: &TransactionFilter) -> Vec<WalletTxRecord> {
        let core = self.shared.read().await;
        let tip = core.tip_height();
        let mut records = core.transactions.list(filter);
        for record in &mut records {
            record.refresh_confirmations(tip);
        }
        records
    }

    /// Height the wallet has processed
    ///
    /// While recovery runs this is the scan progress, which stays below the
    /// chain tip until the rebuilt state is published.
    pub async fn get_height(&self) -> u64 {
        if self.recovery.progress.is_active() {
            return self.recovery.progress.reported_height();
        }
        self.shared.read().await.tip_height()
    }

    /// Poll `get_height` until it reaches `target`, at most `timeout`
    pub async fn wait_for_height(&self, target: u64, timeout: Duration) -> WalletResult<u64> {
        let started = Instant::now();
        loop {
            let height = self.get_height().await;
            if height >= target {
                return Ok(height);
            }
            if started.elapsed() >= timeout {
                return Err(WalletError::RecoveryTimeout {
                    waited_secs: timeout.as_secs(),
                    height: Some(height),
                    target,
                });
            }
            tokio::time::sleep(HEIGHT_POLL_INTERVAL).await;
        }
    }

    pub async fn balances(&self) -> WalletBalances {
        let core = self.shared.read().await;
        WalletBalances {
            transparent: core.transparent_balance(self.params.coinbase_maturity),
            coins_value: core.ledger.unspent_value(),
            coins: core
                .ledger
                .unspent_by_denomination()
                .into_iter()
                .map(|((epoch, denomination), count)| CoinBalance {
                    epoch,
                    denomination,
                    count,
                })
                .collect(),
        }
    }

    pub async fn mints(&self) -> Vec<MintRecord> {
        self.shared.read().await.ledger.mints().to_vec()
    }

    pub async fn spends(&self) -> Vec<SpendRecord> {
        self.shared.read().await.ledger.spends().to_vec()
    }

    pub async fn storage_statistics(&self) -> WalletResult<StorageStats> {
        self.storage.get_statistics().await
    }

    pub async fn close(&self) -> WalletResult<()> {
        self.storage.close().await
    }

    // ---- Live processing ----

    /// Process blocks above the scanned height and the current mempool
    pub async fn sync(&self) -> WalletResult<ScanReport> {
        let _gate = self.shared.lock_writer().await;
        let before = self.shared.snapshot().await;
        let mut core = before.clone();
        let report = self.catch_up(&mut core).await?;
        self.persist_and_publish(&before, core).await?;
        Ok(report)
    }

    async fn catch_up(&self, core: &mut WalletCore) -> WalletResult<ScanReport> {
        let tip = self.chain.tip_height().await?;
        let from = core.scanned_height.map_or(0, |h| h + 1);
        let mut report = self
            .scanner
            .scan_range(
                self.chain.as_ref(),
                core,
                from..=tip,
                UpsertPolicy::PreserveReceivedTime,
                None,
            )
            .await?;
        if self.scanner.config().include_mempool {
            let mempool = self
                .scanner
                .scan_mempool(self.chain.as_ref(), core, UpsertPolicy::PreserveReceivedTime)
                .await?;
            report.merge(mempool);
        }
        for conflict in &report.conflicts {
            warn!("Conflict during sync: {}", conflict);
        }
        Ok(report)
    }

    async fn persist_and_publish(&self, before: &WalletCore, mut core: WalletCore) -> WalletResult<()> {
        core.transactions.refresh_confirmations(core.tip_height());
        let batch = core.diff_batch(before);
        if !batch.is_empty() {
            self.storage.commit(batch).await?;
        }
        self.shared.publish(core).await;
        Ok(())
    }

    // ---- Authoring ----

    /// Mint one coin of `denomination` in the epoch active for the next block
    pub async fn mint(&self, denomination: Denomination) -> WalletResult<WalletTxRecord> {
        let fee = self.params.transaction_fee;
        let maturity = self.params.coinbase_maturity;
        let change = self.keys.change_address();
        self.author(move |core, height| {
            let prepared = core.ledger.prepare_mint(denomination, height)?;
            let value = denomination.value();
            let mut outputs = vec![TxOutput::Mint {
                commitment: prepared.commitment,
                epoch: prepared.epoch.id(),
                value,
            }];
            let inputs = fund_transparent(core, maturity, value + fee, &change, &mut outputs)?;
            let tx = ChainTransaction::new(false, inputs, outputs, rand::random());
            core.ledger.record_prepared(prepared, height, tx.txid)?;
            Ok(tx)
        })
        .await
    }

    /// Reveal one mature coin of `denomination`, paying its full value to
    /// `to` or back to the wallet
    pub async fn spend_coin(
        &self,
        denomination: Denomination,
        to: Option<Address>,
    ) -> WalletResult<WalletTxRecord> {
        let min_confirmations = self.params.mint_confirmations;
        let recipient = to.unwrap_or_else(|| self.keys.receive_address());
        self.author(move |core, _height| {
            let coin = [CoinEpoch::Zerocoin, CoinEpoch::Sigma]
                .into_iter()
                .flat_map(|epoch| core.spendable_mints(epoch, min_confirmations))
                .find(|m| m.denomination == denomination)
                .cloned()
                .ok_or(WalletError::InsufficientFunds {
                    required: denomination.value(),
                    available: 0,
                })?;
            Ok(ChainTransaction::new(
                false,
                vec![coin_input(&coin)],
                vec![TxOutput::Payment {
                    address: recipient,
                    value: coin.value(),
                }],
                rand::random(),
            ))
        })
        .await
    }

    /// Pay several recipients from epoch 2 coins, change to a wallet address
    pub async fn spend_many(&self, recipients: Vec<(Address, Amount)>) -> WalletResult<WalletTxRecord> {
        if recipients.is_empty() || recipients.iter().any(|(_, value)| *value <= 0) {
            return Err(WalletError::InvalidArgument(
                "Multi-output spend needs positive amounts for at least one recipient".to_string(),
            ));
        }
        let min_confirmations = self.params.mint_confirmations;
        let fee = self.params.spend_fee;
        let change = self.keys.change_address();
        self.author(move |core, _height| {
            let paid: Amount = recipients.iter().map(|(_, value)| value).sum();
            let required = paid + fee;
            let available = core.spendable_mints(CoinEpoch::Sigma, min_confirmations);
            let available_value: Amount = available.iter().map(|m| m.value()).sum();
            let coins = select_coins(&available, required).ok_or(WalletError::InsufficientFunds {
                required,
                available: available_value,
            })?;
            let total: Amount = coins.iter().map(|m| m.value()).sum();

            let inputs = coins.iter().map(coin_input).collect();
            let mut outputs: Vec<TxOutput> = recipients
                .into_iter()
                .map(|(address, value)| TxOutput::Payment { address, value })
                .collect();
            if total > required {
                outputs.push(TxOutput::Payment {
                    address: change,
                    value: total - required,
                });
            }
            Ok(ChainTransaction::new(false, inputs, outputs, rand::random()))
        })
        .await
    }

    /// Transparent payment of `amount` to `address`
    pub async fn send(&self, address: Address, amount: Amount) -> WalletResult<WalletTxRecord> {
        if amount <= 0 {
            return Err(WalletError::InvalidArgument(format!(
                "Cannot send non-positive amount {amount}"
            )));
        }
        let fee = self.params.transaction_fee;
        let maturity = self.params.coinbase_maturity;
        let change = self.keys.change_address();
        self.author(move |core, _height| {
            let mut outputs = vec![TxOutput::Payment {
                address,
                value: amount,
            }];
            let inputs = fund_transparent(core, maturity, amount + fee, &change, &mut outputs)?;
            Ok(ChainTransaction::new(false, inputs, outputs, rand::random()))
        })
        .await
    }

    /// Fold one mature epoch 1 coin into epoch 2 coins of the same value
    pub async fn remint(&self, denomination: Denomination) -> WalletResult<WalletTxRecord> {
        let min_confirmations = self.params.mint_confirmations;
        self.author(move |core, height| {
            let active = core.ledger.schedule().active_epoch(height);
            if active != CoinEpoch::Sigma {
                return Err(WalletError::InvalidArgument(format!(
                    "Remint needs {} to be active; height {height} uses {active}",
                    CoinEpoch::Sigma
                )));
            }
            let coin = core
                .spendable_mints(CoinEpoch::Zerocoin, min_confirmations)
                .into_iter()
                .find(|m| m.denomination == denomination)
                .cloned()
                .ok_or(WalletError::InsufficientFunds {
                    required: denomination.value(),
                    available: 0,
                })?;

            let prepared = CoinEpoch::Sigma
                .decompose(coin.value())?
                .into_iter()
                .map(|d| core.ledger.prepare_mint(d, height))
                .collect::<WalletResult<Vec<_>>>()?;
            let outputs = prepared
                .iter()
                .map(|p| TxOutput::Mint {
                    commitment: p.commitment,
                    epoch: p.epoch.id(),
                    value: p.denomination.value(),
                })
                .collect();
            let tx = ChainTransaction::new(false, vec![coin_input(&coin)], outputs, rand::random());
            let conversion = core
                .ledger
                .convert(&[coin.serial_number], prepared, 0, tx.txid, height)?;
            debug!(
                "Reminted {} into {} coins",
                coin.denomination,
                conversion.created.len()
            );
            Ok(tx)
        })
        .await
    }

    /// Build, record, broadcast and classify a transaction authored by the
    /// wallet
    ///
    /// New coin secrets reach storage before the transaction is broadcast.
    /// If broadcast fails the working copy is discarded; the orphaned secrets
    /// stay in storage but never become spendable.
    async fn author<F>(&self, build: F) -> WalletResult<WalletTxRecord>
    where
        F: FnOnce(&mut WalletCore, u64) -> WalletResult<ChainTransaction>,
    {
        let _gate = self.shared.lock_writer().await;
        let before = self.shared.snapshot().await;
        let mut core = before.clone();
        self.catch_up(&mut core).await?;

        let next_height = self.chain.tip_height().await? + 1;
        let tx = build(&mut core, next_height)?;

        let new_secrets: Vec<MintRecord> = core
            .ledger
            .mints()
            .iter()
            .filter(|m| before.ledger.find_by_serial(&m.serial_number).is_none())
            .cloned()
            .collect();
        if !new_secrets.is_empty() {
            self.storage
                .commit(StorageBatch::new().with_mints(new_secrets))
                .await?;
        }

        self.chain.submit(tx.clone()).await?;
        info!("Broadcast {}", tx.txid);

        let mut report = ScanReport::default();
        let record = self
            .scanner
            .classify(&mut core, &tx, None, unix_now(), &mut report)
            .ok_or_else(|| {
                WalletError::ScanningError(format!("Authored transaction {} not recognised", tx.txid))
            })?;
        if let Some(conflict) = report.conflicts.into_iter().next() {
            return Err(conflict);
        }
        core.transactions
            .upsert_with(record.clone(), UpsertPolicy::PreserveReceivedTime);
        self.persist_and_publish(&before, core).await?;
        Ok(record)
    }
}

fn coin_input(coin: &MintRecord) -> TxInput {
    TxInput::CoinSpend {
        serial: coin.serial_number,
        epoch: coin.epoch.id(),
        value: coin.value(),
    }
}

/// Select transparent outputs worth at least `required`, largest first,
/// appending a change output when needed
fn fund_transparent(
    core: &WalletCore,
    coinbase_maturity: u64,
    required: Amount,
    change_address: &Address,
    outputs: &mut Vec<TxOutput>,
) -> WalletResult<Vec<TxInput>> {
    let spendable = core.spendable_outputs(coinbase_maturity);
    let mut inputs = Vec::new();
    let mut total: Amount = 0;
    for output in &spendable {
        if total >= required {
            break;
        }
        inputs.push(TxInput::Transparent {
            prevout: output.outpoint,
        });
        total += output.value;
    }
    if total < required {
        return Err(WalletError::InsufficientFunds {
            required,
            available: total,
        });
    }
    let change = total - required;
    if change > 0 {
        outputs.push(TxOutput::Payment {
            address: change_address.clone(),
            value: change,
        });
    }
    Ok(inputs)
}

/// Pick coins covering `required`
///
/// Takes the smallest coin that covers what is still owed when there is one,
/// otherwise the largest coin, and repeats. `coins` must be sorted largest
/// first.
fn select_coins(coins: &[&MintRecord], required: Amount) -> Option<Vec<MintRecord>> {
    let mut remaining: Vec<&MintRecord> = coins.to_vec();
    let mut chosen = Vec::new();
    let mut owed = required;
    while owed > 0 {
        let pick = remaining
            .iter()
            .rposition(|m| m.value() >= owed)
            .or(if remaining.is_empty() { None } else { Some(0) })?;
        let coin = remaining.remove(pick);
        owed -= coin.value();
        chosen.push(coin.clone());
    }
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::{
            types::{SerialNumber, TxId, COIN},
            wallet_transaction::TxCategory,
        },
        scanning::{MockChain, SimpleKeyring},
        storage::MemoryStorage,
    };

    async fn funded_wallet(
        blocks: u64,
    ) -> Result<(Wallet, MockChain, SimpleKeyring), Box<dyn std::error::Error>> {
        let chain = MockChain::default();
        let keys = SimpleKeyring::from_label("wallet-tests");
        chain.generate(blocks, &keys.receive_address())?;
        let (wallet, _) = WalletBuilder::new()
            .with_storage(Arc::new(MemoryStorage::new()))
            .with_chain(Arc::new(chain.clone()))
            .with_keys(Arc::new(keys.clone()))
            .open()
            .await?;
        wallet.sync().await?;
        Ok((wallet, chain, keys))
    }

    fn coin(value_denomination: Denomination, n: u8) -> MintRecord {
        MintRecord {
            serial_number: SerialNumber::new([n; 32]),
            randomness: crate::data_structures::types::Randomness::new([n; 32]),
            commitment: crate::data_structures::types::Commitment::new([n; 32]),
            epoch: CoinEpoch::Sigma,
            denomination: value_denomination,
            mint_txid: TxId::new([n; 32]),
            mint_height: 400,
            spent: false,
            spend_txid: None,
        }
    }

    #[test]
    fn test_select_coins_prefers_smallest_covering_coin() {
        let coins = [
            coin(Denomination::D100, 1),
            coin(Denomination::D25, 2),
            coin(Denomination::D10, 3),
            coin(Denomination::D0_05, 4),
        ];
        let refs: Vec<&MintRecord> = coins.iter().collect();

        let picked = select_coins(&refs, 20 * COIN).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].denomination, Denomination::D25);

        let picked = select_coins(&refs, 100 * COIN + COIN / 1000).unwrap();
        let denominations: Vec<Denomination> = picked.iter().map(|m| m.denomination).collect();
        assert_eq!(denominations, vec![Denomination::D100, Denomination::D0_05]);

        assert!(select_coins(&refs, 200 * COIN).is_none());
    }

    #[tokio::test]
    async fn test_coinbase_maturity_gates_transparent_funds() -> Result<(), Box<dyn std::error::Error>> {
        let (wallet, _chain, _keys) = funded_wallet(100).await?;
        assert_eq!(wallet.get_height().await, 100);
        assert_eq!(wallet.balances().await.transparent, 50 * COIN);

        let err = wallet.send(Address::from("elsewhere"), 60 * COIN).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_and_confirm() -> Result<(), Box<dyn std::error::Error>> {
        let (wallet, chain, keys) = funded_wallet(101).await?;
        let record = wallet.send(Address::from("elsewhere"), 10 * COIN).await?;
        assert_eq!(record.category, TxCategory::Send);
        assert_eq!(record.amount, -(10 * COIN + COIN / 1000));
        assert_eq!(record.confirmations, 0);
        assert_eq!(chain.mempool_len()?, 1);

        chain.generate(1, &keys.receive_address())?;
        wallet.sync().await?;
        let listed = wallet.list_transactions(&TransactionFilter::new()).await;
        let sent = listed.iter().find(|r| r.txid == record.txid).unwrap();
        assert_eq!(sent.confirmations, 1);
        assert_eq!(sent.time_received, record.time_received);
        Ok(())
    }

    #[tokio::test]
    async fn test_mint_needs_confirmations_before_spend() -> Result<(), Box<dyn std::error::Error>> {
        let (wallet, chain, keys) = funded_wallet(101).await?;
        let minted = wallet.mint(Denomination::D10).await?;
        assert_eq!(minted.category, TxCategory::Mint);
        assert_eq!(minted.amount, -10 * COIN);
        assert_eq!(wallet.mints().await.len(), 1);

        chain.generate(1, &keys.receive_address())?;
        assert!(matches!(
            wallet.spend_coin(Denomination::D10, None).await,
            Err(WalletError::InsufficientFunds { .. })
        ));

        chain.generate(5, &keys.receive_address())?;
        let spent = wallet.spend_coin(Denomination::D10, None).await?;
        assert_eq!(spent.category, TxCategory::Spend);
        assert_eq!(spent.amount, 10 * COIN);

        let mints = wallet.mints().await;
        assert!(mints[0].spent);
        assert_eq!(mints[0].spend_txid, Some(spent.txid));
        assert_eq!(wallet.spends().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_remint_requires_second_epoch() -> Result<(), Box<dyn std::error::Error>> {
        let (wallet, chain, keys) = funded_wallet(101).await?;
        wallet.mint(Denomination::D50).await?;
        chain.generate(10, &keys.receive_address())?;

        let err = wallet.remint(Denomination::D50).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidArgument(_)));

        chain.generate(300, &keys.receive_address())?;
        let record = wallet.remint(Denomination::D50).await?;
        assert_eq!(record.category, TxCategory::Mint);
        assert_eq!(record.amount, -50 * COIN);

        let balances = wallet.balances().await;
        assert_eq!(balances.coins_value, 50 * COIN);
        assert_eq!(
            balances.coins,
            vec![CoinBalance {
                epoch: CoinEpoch::Sigma,
                denomination: Denomination::D25,
                count: 2
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_wait_for_height_times_out() -> Result<(), Box<dyn std::error::Error>> {
        let (wallet, _chain, _keys) = funded_wallet(3).await?;
        assert_eq!(wallet.wait_for_height(3, Duration::from_millis(10)).await?, 3);
        let err = wallet
            .wait_for_height(10, Duration::from_millis(60))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::RecoveryTimeout {
                height: Some(3),
                target: 10,
                ..
            }
        ));
        Ok(())
    }
}
