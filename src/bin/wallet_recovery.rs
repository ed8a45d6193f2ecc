//! Wallet recovery driver
//!
//! Builds the reference regtest history into a wallet database and a chain
//! file, then reopens the wallet under any startup recovery mode and checks
//! that the rebuilt transaction history matches what was there before.
//!
//! ## Usage
//! ```bash
//! # Build the reference history
//! cargo run --bin wallet_recovery --features cli -- simulate --db wallet.db --chain chain.json
//!
//! # Restart with a recovery mode and compare histories
//! cargo run --bin wallet_recovery --features cli -- restart --db wallet.db --chain chain.json --mode zap-full
//!
//! # Print the stored history without recovery
//! cargo run --bin wallet_recovery --features cli -- list --db wallet.db --chain chain.json
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand};
use mintspend_wallet::{
    errors::{WalletError, WalletResult},
    recovery::{verify_history_stable, RecoveryMode},
    scanning::{ChainSource, MockChain, SimpleKeyring},
    simulation::run_reference_scenario,
    storage::{SqliteStorage, TransactionFilter, TxOrder},
    wallet::{Wallet, WalletBuilder},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the reference history into a fresh database and chain file
    Simulate(Paths),
    /// Reopen the wallet under a recovery mode and verify its history
    Restart {
        #[command(flatten)]
        paths: Paths,
        #[arg(long, value_enum, default_value_t = RecoveryMode::Normal)]
        mode: RecoveryMode,
        #[arg(long, default_value = "30", help = "Seconds to wait for recovery to reach the tip")]
        wait_secs: u64,
    },
    /// Print the stored transaction history
    List(Paths),
}

#[derive(Args)]
struct Paths {
    #[arg(long, default_value = "wallet.db", help = "Wallet database file")]
    db: PathBuf,
    #[arg(long, default_value = "chain.json", help = "Regtest chain file")]
    chain: PathBuf,
    #[arg(long, default_value = "wallet", help = "Label the wallet keys derive from")]
    label: String,
}

async fn open(paths: &Paths, chain: &MockChain, mode: RecoveryMode) -> WalletResult<Wallet> {
    let storage = SqliteStorage::new(&paths.db).await?;
    let (wallet, report) = WalletBuilder::new()
        .with_storage(Arc::new(storage))
        .with_chain(Arc::new(chain.clone()))
        .with_keys(Arc::new(SimpleKeyring::from_label(&paths.label)))
        .with_recovery_mode(mode)
        .open()
        .await?;
    report.ensure_consistent()?;
    Ok(wallet)
}

fn listing_filter() -> TransactionFilter {
    TransactionFilter::new().with_order(TxOrder::TxidDescending)
}

async fn simulate(paths: Paths) -> WalletResult<()> {
    for path in [&paths.db, &paths.chain] {
        if path.exists() {
            return Err(WalletError::ConfigurationError(format!(
                "{} already exists; refusing to overwrite",
                path.display()
            )));
        }
    }
    let chain = MockChain::default();
    let wallet = open(&paths, &chain, RecoveryMode::Normal).await?;
    let summary = run_reference_scenario(&wallet, &chain).await?;
    chain.save(&paths.chain)?;
    wallet.close().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn restart(paths: Paths, mode: RecoveryMode, wait_secs: u64) -> WalletResult<()> {
    let chain = MockChain::load(&paths.chain)?;

    let (before, stored_height) = {
        let wallet = open(&paths, &chain, RecoveryMode::Normal).await?;
        let records = wallet.list_transactions(&listing_filter()).await;
        let height = wallet.get_height().await;
        wallet.close().await?;
        (records, height)
    };

    let storage = SqliteStorage::new(&paths.db).await?;
    let (wallet, handle) = WalletBuilder::new()
        .with_storage(Arc::new(storage))
        .with_chain(Arc::new(chain.clone()))
        .with_keys(Arc::new(SimpleKeyring::from_label(&paths.label)))
        .with_recovery_mode(mode)
        .open_in_background()
        .await?;

    let target = if mode.scans_from_genesis() {
        chain.tip_height().await?
    } else {
        stored_height
    };
    let waited = wallet
        .wait_for_height(target, Duration::from_secs(wait_secs))
        .await;
    let report = handle.wait(Duration::from_secs(wait_secs)).await?;
    waited?;
    report.ensure_consistent()?;
    info!("{} recovery finished in {:?}", mode, report.duration);

    let after = wallet.list_transactions(&listing_filter()).await;
    wallet.close().await?;
    let verdict = verify_history_stable(&before, &after, mode.preserves_timestamps());
    if let Err(e) = &verdict {
        warn!("History changed across {} recovery: {}", mode, e);
    }
    println!("{}", serde_json::to_string_pretty(&after)?);
    verdict
}

async fn list(paths: Paths) -> WalletResult<()> {
    let chain = MockChain::load(&paths.chain)?;
    let wallet = open(&paths, &chain, RecoveryMode::Normal).await?;
    let records = wallet.list_transactions(&listing_filter()).await;
    wallet.close().await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

#[tokio::main]
async fn main() -> WalletResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Simulate(paths) => simulate(paths).await,
        Command::Restart {
            paths,
            mode,
            wait_secs,
        } => restart(paths, mode, wait_secs).await,
        Command::List(paths) => list(paths).await,
    }
}
