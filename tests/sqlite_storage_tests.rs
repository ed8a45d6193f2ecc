//! Wallet state persisted in an on-disk SQLite database

#![cfg(feature = "storage")]

use std::{path::Path, sync::Arc};

use mintspend_wallet::{
    data_structures::denomination::Denomination,
    errors::WalletResult,
    recovery::RecoveryMode,
    scanning::{KeyOwnership, MockChain, SimpleKeyring},
    storage::{SqlitePerformanceConfig, SqliteStorage, TransactionFilter, WalletStorage},
    wallet::{Wallet, WalletBuilder},
};

const LABEL: &str = "disk-wallet";

async fn open_at(path: &Path, chain: &MockChain, mode: RecoveryMode) -> WalletResult<Wallet> {
    let storage = SqliteStorage::new_with_config(path, SqlitePerformanceConfig::conservative()).await?;
    let (wallet, report) = WalletBuilder::new()
        .with_storage(Arc::new(storage))
        .with_chain(Arc::new(chain.clone()))
        .with_keys(Arc::new(SimpleKeyring::from_label(LABEL)))
        .with_recovery_mode(mode)
        .open()
        .await?;
    report.ensure_consistent()?;
    Ok(wallet)
}

#[tokio::test]
async fn test_state_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wallet.db");
    let chain = MockChain::default();
    chain.generate(101, &SimpleKeyring::from_label(LABEL).receive_address())?;

    let wallet = open_at(&path, &chain, RecoveryMode::Normal).await?;
    wallet.sync().await?;
    let minted = wallet.mint(Denomination::D10).await?;
    let history = wallet.list_transactions(&TransactionFilter::new()).await;
    let mints = wallet.mints().await;
    let stats = wallet.storage_statistics().await?;
    wallet.close().await?;
    drop(wallet);

    let wallet = open_at(&path, &chain, RecoveryMode::Normal).await?;
    assert_eq!(wallet.get_height().await, 101);
    assert_eq!(wallet.list_transactions(&TransactionFilter::new()).await, history);
    assert_eq!(wallet.mints().await, mints);
    assert_eq!(wallet.storage_statistics().await?, stats);

    assert_eq!(stats.mint_count, 1);
    assert_eq!(stats.unspent_mint_count, 1);
    assert_eq!(stats.unconfirmed_transaction_count, 1);
    assert_eq!(stats.scanned_height, Some(101));
    assert!(history.iter().any(|r| r.txid == minted.txid && !r.is_confirmed()));
    Ok(())
}

#[tokio::test]
async fn test_zap_full_keeps_secret_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wallet.db");
    let chain = MockChain::default();
    let keys = SimpleKeyring::from_label(LABEL);
    chain.generate(101, &keys.receive_address())?;

    let wallet = open_at(&path, &chain, RecoveryMode::Normal).await?;
    wallet.sync().await?;
    wallet.mint(Denomination::D1).await?;
    wallet.mint(Denomination::D25).await?;
    chain.generate(1, &keys.receive_address())?;
    wallet.sync().await?;
    let mut before = wallet.mints().await;
    wallet.close().await?;
    drop(wallet);

    let wallet = open_at(&path, &chain, RecoveryMode::ZapFull).await?;
    wallet.close().await?;
    drop(wallet);

    // Read the rows back through a fresh connection
    let storage = SqliteStorage::new(&path).await?;
    storage.initialize().await?;
    let mut stored = storage.load_mints().await?;
    before.sort_by_key(|m| m.serial_number);
    stored.sort_by_key(|m| m.serial_number);
    assert_eq!(stored.len(), 2);
    for (old, new) in before.iter().zip(&stored) {
        assert!(old.same_secrets(new));
        assert_eq!(old.mint_height, new.mint_height);
    }

    let stats = storage.get_statistics().await?;
    assert_eq!(stats.mint_count, 2);
    assert_eq!(stats.unconfirmed_transaction_count, 0);
    assert_eq!(stats.scanned_height, Some(102));
    Ok(())
}

#[tokio::test]
async fn test_production_presets_keep_durable_writes() {
    assert!(SqlitePerformanceConfig::conservative().is_production_safe());
    assert!(SqlitePerformanceConfig::default().is_production_safe());
    assert!(!SqlitePerformanceConfig::ultra_fast().is_production_safe());
}
