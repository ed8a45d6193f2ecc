//! Reference regtest scenario
//!
//! Builds a history that exercises every transaction category and both coin
//! epochs: coinbase rewards, epoch 1 mints and spends, a transparent send, a
//! remint across the epoch boundary, epoch 2 mints, multi-output spends and a
//! final payment left in the mempool.

use serde::Serialize;
use tracing::info;

use crate::{
    data_structures::{
        denomination::Denomination,
        types::{Address, COIN},
    },
    errors::WalletResult,
    scanning::{KeyOwnership, MockChain, SimpleKeyring},
    storage::TransactionFilter,
    wallet::Wallet,
};

/// Blocks mined before the first mint, enough for mature coinbase funds
pub const INITIAL_BLOCKS: u64 = 150;

const EPOCH1_MINTS: [Denomination; 5] = [
    Denomination::D1,
    Denomination::D10,
    Denomination::D25,
    Denomination::D50,
    Denomination::D100,
];

const EPOCH2_MINTS: [Denomination; 7] = [
    Denomination::D0_05,
    Denomination::D0_1,
    Denomination::D0_5,
    Denomination::D1,
    Denomination::D10,
    Denomination::D25,
    Denomination::D100,
];

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    pub tip_height: u64,
    pub transactions: usize,
    pub unconfirmed: usize,
    pub mints: usize,
    pub unspent_mints: usize,
}

/// Address outside the wallet that receives the scenario's payments
pub fn payee_address() -> Address {
    SimpleKeyring::from_label("scenario-payee").receive_address()
}

async fn generate(wallet: &Wallet, chain: &MockChain, count: u64) -> WalletResult<()> {
    chain.generate(count, &wallet.receive_address())?;
    wallet.sync().await?;
    Ok(())
}

/// Drive `wallet` through the reference history on `chain`
///
/// Expects a fresh chain holding only its genesis block.
pub async fn run_reference_scenario(wallet: &Wallet, chain: &MockChain) -> WalletResult<ScenarioSummary> {
    let payee = payee_address();

    generate(wallet, chain, INITIAL_BLOCKS).await?;

    info!("Minting epoch 1 coins");
    for denomination in EPOCH1_MINTS {
        wallet.mint(denomination).await?;
        wallet.mint(denomination).await?;
    }
    generate(wallet, chain, 10).await?;

    wallet.spend_coin(Denomination::D1, None).await?;
    wallet.spend_coin(Denomination::D10, None).await?;
    wallet.send(payee.clone(), 25 * COIN).await?;
    generate(wallet, chain, 290).await?;

    info!("Reminting into epoch 2 at height {}", wallet.get_height().await);
    wallet.remint(Denomination::D50).await?;
    generate(wallet, chain, 10).await?;

    info!("Minting epoch 2 coins");
    for denomination in EPOCH2_MINTS {
        wallet.mint(denomination).await?;
        wallet.mint(denomination).await?;
    }
    generate(wallet, chain, 100).await?;

    wallet.spend_many(vec![(payee.clone(), 100 * COIN)]).await?;
    wallet.spend_many(vec![(payee.clone(), 25 * COIN)]).await?;
    generate(wallet, chain, 10).await?;

    // Left unconfirmed on purpose
    wallet.send(payee, 10 * COIN).await?;

    let records = wallet.list_transactions(&TransactionFilter::new()).await;
    let mints = wallet.mints().await;
    let summary = ScenarioSummary {
        tip_height: wallet.get_height().await,
        transactions: records.len(),
        unconfirmed: records.iter().filter(|r| !r.is_confirmed()).count(),
        mints: mints.len(),
        unspent_mints: mints.iter().filter(|m| m.is_unspent()).count(),
    };
    info!(
        "Scenario complete at height {}: {} transactions, {} mints",
        summary.tip_height, summary.transactions, summary.mints
    );
    Ok(summary)
}
